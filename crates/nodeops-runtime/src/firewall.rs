//! Host firewall: a fixed inbound rule set applied idempotently.

use anyhow::Result;
use serde::Serialize;
use tracing::{info, instrument};

use crate::shell;

const CHAIN: &str = "INPUT";

/// Public TCP ports: ssh, http, https, the node API, and the workload port range.
pub const TCP_PORTS: [&str; 5] = ["22", "80", "443", "3009", "10000:18192"];
pub const UDP_PORTS: [&str; 1] = ["53"];
pub const ICMP_TYPES: [&str; 3] = ["destination-unreachable", "source-quench", "time-exceeded"];

/// One rule in the inbound chain, as iptables arguments after the chain name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rule {
    pub spec: Vec<String>,
}

impl Rule {
    fn new(spec: &[&str]) -> Self {
        Self {
            spec: spec.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn line(&self) -> String {
        self.spec.join(" ")
    }
}

/// Accept rules in priority order. The final drop rule is separate.
pub fn accept_rules() -> Vec<Rule> {
    let mut rules = vec![
        Rule::new(&["-i", "lo", "-j", "ACCEPT"]),
        Rule::new(&["-m", "conntrack", "--ctstate", "RELATED,ESTABLISHED", "-j", "ACCEPT"]),
    ];
    for port in TCP_PORTS {
        rules.push(Rule::new(&["-p", "tcp", "--dport", port, "-j", "ACCEPT"]));
    }
    for port in UDP_PORTS {
        rules.push(Rule::new(&["-p", "udp", "--dport", port, "-j", "ACCEPT"]));
    }
    for kind in ICMP_TYPES {
        rules.push(Rule::new(&["-p", "icmp", "--icmp-type", kind, "-j", "ACCEPT"]));
    }
    rules
}

pub fn drop_rule() -> Rule {
    Rule::new(&["-j", "DROP"])
}

fn exists(rule: &Rule) -> bool {
    let mut args = vec!["-C", CHAIN];
    args.extend(rule.spec.iter().map(String::as_str));
    shell::succeeds("iptables", &args)
}

/// Insert missing accept rules at their position (ahead of any drop rule),
/// append the drop rule if missing, and persist when anything changed.
/// Returns the number of rules added.
#[instrument]
pub fn apply() -> Result<usize> {
    let mut added = 0;
    for (index, rule) in accept_rules().iter().enumerate() {
        if exists(rule) {
            continue;
        }
        let position = (index + 1).to_string();
        let mut args = vec!["-I", CHAIN, position.as_str()];
        args.extend(rule.spec.iter().map(String::as_str));
        shell::run_checked("iptables", &args)?;
        added += 1;
    }

    let drop = drop_rule();
    if !exists(&drop) {
        let mut args = vec!["-A", CHAIN];
        args.extend(drop.spec.iter().map(String::as_str));
        shell::run_checked("iptables", &args)?;
        added += 1;
    }

    if added > 0 {
        shell::run_checked("netfilter-persistent", &["save"])?;
    }
    info!(added, "firewall rules applied");
    Ok(added)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell_mock::{MockResponse, mock_shell};

    #[test]
    fn test_apply_on_empty_chain() {
        let (_guard, calls) = mock_shell()
            .respond("iptables -C", MockResponse::fail(1, "Bad rule"))
            .install();

        let added = apply().unwrap();
        assert_eq!(added, accept_rules().len() + 1);
        assert!(calls.contains("iptables -I INPUT 1 -i lo -j ACCEPT"));
        assert!(calls.contains("iptables -A INPUT -j DROP"));
        assert_eq!(calls.count("netfilter-persistent save"), 1);
    }

    #[test]
    fn test_apply_is_idempotent() {
        let (_guard, calls) = mock_shell().install();
        assert_eq!(apply().unwrap(), 0);
        assert!(!calls.contains("iptables -I"));
        assert!(!calls.contains("netfilter-persistent"));
    }

    #[test]
    fn test_missing_rule_keeps_its_position() {
        let (_guard, calls) = mock_shell()
            .respond("iptables -C INPUT -p tcp --dport 443", MockResponse::fail(1, ""))
            .install();
        assert_eq!(apply().unwrap(), 1);
        // lo, conntrack, 22, 80, then 443
        assert!(calls.contains("iptables -I INPUT 5 -p tcp --dport 443 -j ACCEPT"));
    }
}
