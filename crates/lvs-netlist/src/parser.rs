//! SPICE / CDL subcircuit parser.
//!
//! Syntax problems never abort a parse: malformed device lines are kept with
//! whatever fields could be read and a [`ParseDiagnostic`] is recorded.

use std::fs;
use std::io;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{DeviceKind, DeviceRecord, ParamValue, Subcircuit};

#[derive(Error, Debug)]
pub enum NetlistError {
    #[error("failed to read netlist {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to write netlist {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// A recoverable problem found while parsing, tagged with the source line of
/// the logical line it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseDiagnostic {
    pub line: usize,
    pub message: String,
}

/// All subcircuits of a netlist, in file order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Netlist {
    pub subcircuits: IndexMap<String, Subcircuit>,
    pub diagnostics: Vec<ParseDiagnostic>,
}

impl Netlist {
    pub fn get(&self, name: &str) -> Option<&Subcircuit> {
        self.subcircuits.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.subcircuits.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.subcircuits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subcircuits.is_empty()
    }
}

// ── Logical lines ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
struct LogicalLine {
    /// 1-based number of the physical line the logical line starts on.
    number: usize,
    text: String,
}

/// Drop an inline `$` comment (a `$` at the start or after whitespace).
fn strip_inline_comment(line: &str) -> &str {
    let bytes = line.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'$' && (i == 0 || bytes[i - 1].is_ascii_whitespace()) {
            return &line[..i];
        }
    }
    line
}

fn logical_lines(source: &str) -> Vec<LogicalLine> {
    let mut lines: Vec<LogicalLine> = Vec::new();
    for (idx, raw) in source.lines().enumerate() {
        let s = strip_inline_comment(raw).trim();
        if s.is_empty() || s.starts_with('*') || s.starts_with(';') {
            continue;
        }
        if let Some(cont) = s.strip_prefix('+') {
            match lines.last_mut() {
                Some(prev) => {
                    prev.text.push(' ');
                    prev.text.push_str(cont.trim_start());
                }
                None => log::debug!("line {}: stray continuation ignored", idx + 1),
            }
            continue;
        }
        lines.push(LogicalLine {
            number: idx + 1,
            text: s.to_string(),
        });
    }
    lines
}

// ── Parser ───────────────────────────────────────────────────────────

#[derive(Debug, Default)]
enum ReaderState {
    #[default]
    Top,
    Subckt(Subcircuit),
}

#[derive(Debug, Default)]
struct Parser {
    state: ReaderState,
    netlist: Netlist,
}

impl Parser {
    fn diagnostic(&mut self, line: usize, message: String) {
        log::warn!("netlist line {}: {}", line, message);
        self.netlist
            .diagnostics
            .push(ParseDiagnostic { line, message });
    }

    fn close(&mut self, line: usize) {
        if let ReaderState::Subckt(sub) = std::mem::take(&mut self.state) {
            if self.netlist.subcircuits.contains_key(&sub.name) {
                self.diagnostic(
                    line,
                    format!("subcircuit '{}' redefined; the later definition wins", sub.name),
                );
            }
            self.netlist.subcircuits.insert(sub.name.clone(), sub);
        }
    }

    fn line(&mut self, line: &LogicalLine) {
        let tokens: Vec<&str> = line.text.split_whitespace().collect();
        let Some(&first) = tokens.first() else {
            return;
        };
        let keyword = first.to_ascii_lowercase();

        if keyword == ".subckt" {
            if let ReaderState::Subckt(open) = &self.state {
                let msg = format!(".SUBCKT inside open subcircuit '{}'; closing it", open.name);
                self.diagnostic(line.number, msg);
                self.close(line.number);
            }
            let Some(&name) = tokens.get(1) else {
                self.diagnostic(line.number, ".SUBCKT without a name".into());
                return;
            };
            let ports = tokens[2..]
                .iter()
                .filter(|t| !t.contains('=') && **t != "/")
                .map(|t| t.to_string())
                .collect();
            self.state = ReaderState::Subckt(Subcircuit::new(name, ports));
            return;
        }
        if keyword == ".ends" {
            self.close(line.number);
            return;
        }
        if keyword.starts_with('.') {
            return;
        }

        if matches!(self.state, ReaderState::Top) {
            return;
        }
        let device = self.device(line.number, &tokens);
        if let ReaderState::Subckt(sub) = &mut self.state {
            sub.devices.push(device);
        }
    }

    fn device(&mut self, number: usize, tokens: &[&str]) -> DeviceRecord {
        let instance = tokens[0];
        let rest = &tokens[1..];
        let kind = DeviceKind::from_instance(instance);
        let owned = |ts: &[&str]| ts.iter().map(|t| t.to_string()).collect::<Vec<_>>();

        match kind {
            DeviceKind::Mosfet => {
                if rest.len() < 5 {
                    self.diagnostic(
                        number,
                        format!("MOSFET '{}' needs 4 nets and a model, found {} tokens", instance, rest.len()),
                    );
                    return DeviceRecord::new(instance, owned(rest), None);
                }
                let mut dev = DeviceRecord::new(instance, owned(&rest[..4]), Some(rest[4].to_string()));
                add_params(&mut dev, &rest[5..]);
                dev
            }
            DeviceKind::Instance => {
                let mut positional: Vec<&str> = Vec::new();
                let mut params: Vec<&str> = Vec::new();
                for tok in rest {
                    let tok = tok.trim_start_matches('/');
                    if tok.is_empty() {
                        continue;
                    }
                    if tok.contains('=') {
                        params.push(tok);
                    } else {
                        positional.push(tok);
                    }
                }
                let Some((&target, nets)) = positional.split_last() else {
                    self.diagnostic(number, format!("instance '{}' has no subcircuit name", instance));
                    return DeviceRecord::new(instance, Vec::new(), None);
                };
                let mut dev = DeviceRecord::new(instance, owned(nets), Some(target.to_string()));
                add_params(&mut dev, &params);
                dev
            }
            DeviceKind::Other(_) => {
                if rest.len() < 3 {
                    self.diagnostic(
                        number,
                        format!("device '{}' needs 2 nets and a value, found {} tokens", instance, rest.len()),
                    );
                    return DeviceRecord::new(instance, owned(rest), None);
                }
                let mut dev = DeviceRecord::new(instance, owned(&rest[..2]), Some(rest[2].to_string()));
                add_params(&mut dev, &rest[3..]);
                dev
            }
        }
    }

    fn finish(mut self, last_line: usize) -> Netlist {
        if let ReaderState::Subckt(open) = &self.state {
            let msg = format!("subcircuit '{}' is missing .ENDS", open.name);
            self.diagnostic(last_line, msg);
            self.close(last_line);
        }
        self.netlist
    }
}

fn add_params(dev: &mut DeviceRecord, tokens: &[&str]) {
    for tok in tokens {
        match tok.split_once('=') {
            Some((k, v)) => {
                dev.params
                    .insert(k.to_string(), ParamValue::Value(v.to_string()));
            }
            None => {
                dev.params.entry(tok.to_string()).or_insert(ParamValue::Flag);
            }
        }
    }
}

/// Parse netlist text.
pub fn parse_str(source: &str) -> Netlist {
    let lines = logical_lines(source);
    let mut parser = Parser::default();
    for line in &lines {
        parser.line(line);
    }
    let last = lines.last().map(|l| l.number).unwrap_or(0);
    let netlist = parser.finish(last);
    log::info!(
        "Parsed {} subcircuits ({} diagnostics)",
        netlist.len(),
        netlist.diagnostics.len()
    );
    netlist
}

pub fn parse_file(path: impl AsRef<Path>) -> Result<Netlist, NetlistError> {
    let path = path.as_ref();
    let source = fs::read_to_string(path).map_err(|source| NetlistError::Read {
        path: path.display().to_string(),
        source,
    })?;
    Ok(parse_str(&source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DeviceModel;

    const INV: &str = "\
* inverter
.SUBCKT INV A Y VDD VSS
MP Y A VDD VDD PMOS W=2u
+ L=0.2u
; a comment
MN Y A VSS VSS NMOS W=1u L=0.2u $ inline note
.ENDS INV
";

    #[test]
    fn test_continuations_and_comments() {
        let netlist = parse_str(INV);
        assert!(netlist.diagnostics.is_empty());
        let inv = netlist.get("INV").unwrap();
        assert_eq!(inv.ports, vec!["A", "Y", "VDD", "VSS"]);
        assert_eq!(inv.devices.len(), 2);

        let mp = &inv.devices[0];
        assert_eq!(mp.nets, vec!["Y", "A", "VDD", "VDD"]);
        assert_eq!(mp.device_model(), Some(DeviceModel::Pmos));
        assert_eq!(mp.width(), Some(2.0));
        assert_eq!(mp.length(), Some(0.2));

        let mn = &inv.devices[1];
        assert_eq!(mn.params.len(), 2);
    }

    #[test]
    fn test_malformed_lines_are_kept_partial() {
        let src = "\
.subckt BAD a b
M1 a b c NMOS
R1 a
C1 a b 1p
X1
.ends
";
        let netlist = parse_str(src);
        let bad = netlist.get("BAD").unwrap();
        assert_eq!(bad.devices.len(), 4);
        assert_eq!(bad.devices[0].model, None);
        assert_eq!(bad.devices[0].nets, vec!["a", "b", "c", "NMOS"]);
        assert_eq!(bad.devices[1].nets, vec!["a"]);
        assert_eq!(bad.devices[2].model.as_deref(), Some("1p"));
        assert_eq!(netlist.diagnostics.len(), 3);
        assert_eq!(netlist.diagnostics[0].line, 2);
    }

    #[test]
    fn test_instances_and_flags() {
        let src = "\
.SUBCKT TOP in out vdd vss
XI0 in mid vdd vss / INV
XI1 mid out vdd vss INV m=2
M0 out in vss vss nch W=1u L=1u dummy
.ENDS
";
        let netlist = parse_str(src);
        let top = netlist.get("TOP").unwrap();
        let x0 = &top.devices[0];
        assert_eq!(x0.kind, DeviceKind::Instance);
        assert_eq!(x0.model.as_deref(), Some("INV"));
        assert_eq!(x0.nets.len(), 4);
        let x1 = &top.devices[1];
        assert_eq!(x1.model.as_deref(), Some("INV"));
        assert_eq!(x1.param("M"), Some(&ParamValue::Value("2".into())));
        assert_eq!(top.devices[2].param("dummy"), Some(&ParamValue::Flag));
        assert_eq!(top.instances().count(), 2);
    }

    #[test]
    fn test_nested_subckt_and_missing_ends() {
        let src = "\
.SUBCKT A x
R1 x y 1k
.SUBCKT B x
R2 x y 2k
";
        let netlist = parse_str(src);
        assert_eq!(netlist.names().collect::<Vec<_>>(), vec!["A", "B"]);
        assert_eq!(netlist.diagnostics.len(), 2);
        assert_eq!(netlist.get("A").unwrap().devices.len(), 1);
    }

    #[test]
    fn test_stray_continuation_ignored() {
        let netlist = parse_str("+ W=1u\n.SUBCKT E a\n.ENDS\n");
        assert_eq!(netlist.len(), 1);
        assert!(netlist.get("E").unwrap().devices.is_empty());
    }

    #[test]
    fn test_parse_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inv.cdl");
        std::fs::write(&path, INV).unwrap();
        let netlist = parse_file(&path).unwrap();
        assert!(netlist.get("INV").is_some());
        assert!(parse_file(dir.path().join("missing.cdl")).is_err());
    }
}
