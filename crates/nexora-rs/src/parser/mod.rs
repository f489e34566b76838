//! Native-output parsers, one per tool. Each maps the tool's own report
//! format into the shared `Finding` schema; severity mapping tables live
//! next to the parser that uses them.

use quick_xml::de::from_str;
use serde::Deserialize;

use crate::models::{Finding, Severity, Tool};

// ---------------------------------------------------------------------------
// Nmap (XML via `-oX -`)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct NmapRun {
    #[serde(rename = "host", default)]
    hosts: Vec<NmapHost>,
}

#[derive(Debug, Deserialize)]
struct NmapHost {
    #[serde(default)]
    ports: Option<NmapPorts>,
}

#[derive(Debug, Deserialize)]
struct NmapPorts {
    #[serde(rename = "port", default)]
    ports: Vec<NmapPort>,
}

#[derive(Debug, Deserialize)]
struct NmapPort {
    #[serde(rename = "@portid")]
    portid: u16,
    #[serde(rename = "@protocol")]
    protocol: String,
    state: NmapState,
    #[serde(default)]
    service: Option<NmapService>,
    #[serde(rename = "script", default)]
    scripts: Vec<NmapScript>,
}

#[derive(Debug, Deserialize)]
struct NmapState {
    #[serde(rename = "@state")]
    state: String,
}

#[derive(Debug, Deserialize)]
struct NmapService {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@product", default)]
    product: Option<String>,
    #[serde(rename = "@version", default)]
    version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NmapScript {
    #[serde(rename = "@id")]
    id: String,
    #[serde(rename = "@output", default)]
    output: String,
}

/// CVSS bands used for vulners NSE results:
/// `< 4.0` Low, `4.0–6.9` Medium, `7.0–8.9` High, `>= 9.0` Critical.
pub fn severity_from_cvss(score: f32) -> Severity {
    if score >= 9.0 {
        Severity::Critical
    } else if score >= 7.0 {
        Severity::High
    } else if score >= 4.0 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// Parses nmap XML into findings: one Info finding per open port, plus one
/// finding per vulners NSE entry with its CVSS score mapped onto the shared
/// scale. A parse error is surfaced to the adapter, which degrades to an
/// empty finding list while retaining the raw log.
pub fn parse_nmap_xml(xml: &str) -> anyhow::Result<Vec<Finding>> {
    let run: NmapRun = from_str(xml)?;
    let mut findings = Vec::new();

    for host in run.hosts {
        let Some(ports) = host.ports else { continue };
        for port in ports.ports {
            if port.state.state != "open" {
                continue;
            }
            let service_name = port.service.as_ref().map(|s| s.name.clone());
            let service_desc = port
                .service
                .as_ref()
                .map(|s| {
                    let mut d = s.name.clone();
                    if let Some(product) = &s.product {
                        d.push(' ');
                        d.push_str(product);
                    }
                    if let Some(version) = &s.version {
                        d.push(' ');
                        d.push_str(version);
                    }
                    d
                })
                .unwrap_or_else(|| "unidentified service".to_string());

            findings.push(Finding {
                tool: Tool::Nmap,
                severity: Severity::Info,
                title: format!("Open port {}/{}", port.portid, port.protocol),
                description: format!("Exposed service: {service_desc}"),
                evidence: None,
                port: Some(port.portid),
                service: service_name.clone(),
            });

            for script in &port.scripts {
                if script.id != "vulners" {
                    continue;
                }
                findings.extend(parse_vulners_output(
                    &script.output,
                    port.portid,
                    service_name.as_deref(),
                ));
            }
        }
    }

    Ok(findings)
}

/// Each vulners line is `<id> <cvss> <url> [*EXPLOIT*]`, tab or space
/// separated, nested under a cpe heading.
fn parse_vulners_output(output: &str, port: u16, service: Option<&str>) -> Vec<Finding> {
    let mut findings = Vec::new();
    for line in output.lines() {
        let mut parts = line.split_whitespace();
        let (Some(id), Some(score_text)) = (parts.next(), parts.next()) else {
            continue;
        };
        let Ok(score) = score_text.parse::<f32>() else {
            continue;
        };
        if id.ends_with(':') {
            // cpe heading line, not a vulnerability entry
            continue;
        }
        findings.push(Finding {
            tool: Tool::Nmap,
            severity: severity_from_cvss(score),
            title: format!("{id} (CVSS {score:.1})"),
            description: format!("Reported by the vulners NSE script for port {port}"),
            evidence: Some(line.trim().to_string()),
            port: Some(port),
            service: service.map(ToString::to_string),
        });
    }
    findings
}

// ---------------------------------------------------------------------------
// OWASP ZAP (JSON quick-scan report)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ZapReport {
    #[serde(default)]
    site: Vec<ZapSite>,
}

#[derive(Debug, Deserialize)]
struct ZapSite {
    #[serde(default)]
    alerts: Vec<ZapAlert>,
}

#[derive(Debug, Deserialize)]
struct ZapAlert {
    #[serde(default)]
    alert: String,
    #[serde(default)]
    riskcode: String,
    #[serde(default)]
    desc: String,
    #[serde(default)]
    instances: Vec<ZapInstance>,
}

#[derive(Debug, Deserialize)]
struct ZapInstance {
    #[serde(default)]
    uri: String,
}

/// ZAP risk codes: 0 Informational, 1 Low, 2 Medium, 3 High. ZAP has no
/// critical tier; unknown codes degrade to Info.
pub fn severity_from_zap_riskcode(code: &str) -> Severity {
    match code.trim() {
        "1" => Severity::Low,
        "2" => Severity::Medium,
        "3" => Severity::High,
        _ => Severity::Info,
    }
}

pub fn parse_zap_json(raw: &str) -> anyhow::Result<Vec<Finding>> {
    let report: ZapReport = serde_json::from_str(raw)?;
    let mut findings = Vec::new();
    for site in report.site {
        for alert in site.alerts {
            let evidence = alert.instances.first().map(|i| i.uri.clone());
            findings.push(Finding {
                tool: Tool::Zap,
                severity: severity_from_zap_riskcode(&alert.riskcode),
                title: alert.alert,
                description: strip_tags(&alert.desc),
                evidence,
                port: None,
                service: None,
            });
        }
    }
    Ok(findings)
}

// ---------------------------------------------------------------------------
// Arachni (JSON produced by arachni_reporter)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ArachniReport {
    #[serde(default)]
    issues: Vec<ArachniIssue>,
}

#[derive(Debug, Deserialize)]
struct ArachniIssue {
    #[serde(default)]
    name: String,
    #[serde(default)]
    severity: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    vector: Option<ArachniVector>,
}

#[derive(Debug, Deserialize)]
struct ArachniVector {
    #[serde(default)]
    action: Option<String>,
}

/// Arachni ratings: informational → Info, low/medium/high map one-to-one.
/// Arachni has no critical tier; unknown ratings degrade to Info.
pub fn severity_from_arachni(rating: &str) -> Severity {
    match rating.trim().to_ascii_lowercase().as_str() {
        "low" => Severity::Low,
        "medium" => Severity::Medium,
        "high" => Severity::High,
        _ => Severity::Info,
    }
}

pub fn parse_arachni_json(raw: &str) -> anyhow::Result<Vec<Finding>> {
    let report: ArachniReport = serde_json::from_str(raw)?;
    Ok(report
        .issues
        .into_iter()
        .map(|issue| Finding {
            tool: Tool::Arachni,
            severity: severity_from_arachni(&issue.severity),
            title: issue.name,
            description: issue.description.trim().to_string(),
            evidence: issue.vector.and_then(|v| v.action),
            port: None,
            service: None,
        })
        .collect())
}

fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const NMAP_XML: &str = r#"<?xml version="1.0"?>
<nmaprun>
  <host>
    <address addr="192.0.2.10" addrtype="ipv4"/>
    <ports>
      <port protocol="tcp" portid="22">
        <state state="open"/>
        <service name="ssh" product="OpenSSH" version="8.2p1"/>
      </port>
      <port protocol="tcp" portid="80">
        <state state="open"/>
        <service name="http" product="Apache httpd" version="2.4.29"/>
        <script id="vulners" output="
  cpe:/a:apache:http_server:2.4.29:
    	CVE-2021-41773	7.5	https://vulners.com/cve/CVE-2021-41773
    	CVE-2022-22720	9.8	https://vulners.com/cve/CVE-2022-22720
    	CVE-2020-13938	3.7	https://vulners.com/cve/CVE-2020-13938
"/>
      </port>
      <port protocol="tcp" portid="443">
        <state state="closed"/>
      </port>
    </ports>
  </host>
</nmaprun>"#;

    #[test]
    fn nmap_open_ports_become_info_findings() {
        let findings = parse_nmap_xml(NMAP_XML).unwrap();
        let open: Vec<_> = findings
            .iter()
            .filter(|f| f.severity == Severity::Info)
            .collect();
        assert_eq!(open.len(), 2, "closed ports are ignored");
        assert_eq!(open[0].title, "Open port 22/tcp");
        assert_eq!(open[0].port, Some(22));
        assert_eq!(open[0].service.as_deref(), Some("ssh"));
        assert!(open[1].description.contains("Apache httpd 2.4.29"));
    }

    #[test]
    fn vulners_entries_map_cvss_bands() {
        let findings = parse_nmap_xml(NMAP_XML).unwrap();
        let cves: Vec<_> = findings
            .iter()
            .filter(|f| f.title.starts_with("CVE-"))
            .collect();
        assert_eq!(cves.len(), 3);
        assert_eq!(cves[0].severity, Severity::High);
        assert_eq!(cves[1].severity, Severity::Critical);
        assert_eq!(cves[2].severity, Severity::Low);
        assert!(cves.iter().all(|f| f.port == Some(80)));
    }

    #[test]
    fn nmap_garbage_is_a_parse_error() {
        assert!(parse_nmap_xml("Starting Nmap ( https://nmap.org )").is_err());
    }

    #[test]
    fn cvss_band_edges() {
        assert_eq!(severity_from_cvss(0.0), Severity::Low);
        assert_eq!(severity_from_cvss(3.9), Severity::Low);
        assert_eq!(severity_from_cvss(4.0), Severity::Medium);
        assert_eq!(severity_from_cvss(6.9), Severity::Medium);
        assert_eq!(severity_from_cvss(7.0), Severity::High);
        assert_eq!(severity_from_cvss(8.9), Severity::High);
        assert_eq!(severity_from_cvss(9.0), Severity::Critical);
        assert_eq!(severity_from_cvss(10.0), Severity::Critical);
    }

    #[test]
    fn zap_alerts_are_normalized() {
        let raw = r#"{
            "site": [{
                "@name": "https://example.com",
                "alerts": [
                    {
                        "alert": "Content Security Policy Header Not Set",
                        "riskcode": "2",
                        "desc": "<p>CSP is an added layer of security.</p>",
                        "instances": [{"uri": "https://example.com/"}]
                    },
                    {
                        "alert": "Server Leaks Version Information",
                        "riskcode": "1",
                        "desc": "banner disclosure",
                        "instances": []
                    }
                ]
            }]
        }"#;
        let findings = parse_zap_json(raw).unwrap();
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].severity, Severity::Medium);
        assert_eq!(findings[0].description, "CSP is an added layer of security.");
        assert_eq!(
            findings[0].evidence.as_deref(),
            Some("https://example.com/")
        );
        assert_eq!(findings[1].severity, Severity::Low);
        assert!(findings[1].evidence.is_none());
    }

    #[test]
    fn zap_riskcode_table() {
        assert_eq!(severity_from_zap_riskcode("0"), Severity::Info);
        assert_eq!(severity_from_zap_riskcode("3"), Severity::High);
        assert_eq!(severity_from_zap_riskcode("bogus"), Severity::Info);
    }

    #[test]
    fn arachni_issues_are_normalized() {
        let raw = r#"{
            "issues": [
                {
                    "name": "Cross-Site Scripting (XSS)",
                    "severity": "High",
                    "description": "Client-side code injection.",
                    "vector": {"action": "https://example.com/search"}
                },
                {
                    "name": "Interesting response",
                    "severity": "informational",
                    "description": "Unusual status code."
                }
            ]
        }"#;
        let findings = parse_arachni_json(raw).unwrap();
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].severity, Severity::High);
        assert_eq!(
            findings[0].evidence.as_deref(),
            Some("https://example.com/search")
        );
        assert_eq!(findings[1].severity, Severity::Info);
    }
}
