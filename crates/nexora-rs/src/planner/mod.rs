use std::time::Duration;

use crate::config::AppConfig;
use crate::models::{ScanMode, Tool};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortScope {
    Top(u16),
    Full,
}

/// Per-entry options derived from the mode. Adapters read the fields that
/// apply to their tool and ignore the rest.
#[derive(Debug, Clone)]
pub struct ToolOptions {
    pub timeout: Duration,
    pub port_scope: PortScope,
    pub service_detection: bool,
    pub vuln_scripts: bool,
    /// Active (attacking) profile for the web scanners; passive otherwise.
    pub active: bool,
}

#[derive(Debug, Clone)]
pub struct PlanEntry {
    pub tool: Tool,
    pub options: ToolOptions,
}

pub type ExecutionPlan = Vec<PlanEntry>;

impl ToolOptions {
    fn base(timeout: Duration) -> Self {
        Self {
            timeout,
            port_scope: PortScope::Top(100),
            service_detection: false,
            vuln_scripts: false,
            active: false,
        }
    }
}

/// Maps a requested mode and the user's tool selection to a concrete ordered
/// plan. Only tools both selected and applicable to the mode are included:
///
/// - quick:    nmap only (host discovery + common ports)
/// - balanced: nmap with service detection + vulners, zap in passive profile
/// - deep:     nmap full range, zap active, arachni active
///
/// Entries are ordered nmap, zap, arachni. An empty plan is valid and yields
/// a run with zero outcomes.
pub fn plan(mode: ScanMode, selection: &[Tool], config: &AppConfig) -> ExecutionPlan {
    let timeout = Duration::from_secs(config.timeout_secs(mode));
    let mut entries = Vec::new();

    for tool in Tool::ALL {
        if !selection.contains(&tool) {
            continue;
        }
        let options = match (tool, mode) {
            (Tool::Nmap, ScanMode::Quick) => ToolOptions::base(timeout),
            (Tool::Nmap, ScanMode::Balanced) => ToolOptions {
                port_scope: PortScope::Top(1000),
                service_detection: true,
                vuln_scripts: true,
                ..ToolOptions::base(timeout)
            },
            (Tool::Nmap, ScanMode::Deep) => ToolOptions {
                port_scope: PortScope::Full,
                service_detection: true,
                vuln_scripts: true,
                ..ToolOptions::base(timeout)
            },
            (Tool::Zap, ScanMode::Balanced) => ToolOptions::base(timeout),
            (Tool::Zap, ScanMode::Deep) | (Tool::Arachni, ScanMode::Deep) => ToolOptions {
                active: true,
                ..ToolOptions::base(timeout)
            },
            // Excluded by the mode table even when selected.
            (Tool::Zap, ScanMode::Quick)
            | (Tool::Arachni, ScanMode::Quick)
            | (Tool::Arachni, ScanMode::Balanced) => continue,
        };
        entries.push(PlanEntry { tool, options });
    }

    entries
}
