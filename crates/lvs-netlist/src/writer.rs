use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::model::{ParamValue, Subcircuit};
use crate::parser::NetlistError;

/// Format a micrometer dimension with a `u` suffix and no trailing zeros.
pub fn format_dimension(um: f64) -> String {
    let mut s = format!("{:.6}", um);
    while s.ends_with('0') {
        s.pop();
    }
    if s.ends_with('.') {
        s.pop();
    }
    if s == "-0" {
        s = "0".to_string();
    }
    format!("{}u", s)
}

/// Render one `.SUBCKT` block.
pub fn subcircuit_to_string(sub: &Subcircuit) -> String {
    let mut out = String::new();
    let _ = write!(out, ".SUBCKT {}", sub.name);
    for port in &sub.ports {
        let _ = write!(out, " {}", port);
    }
    out.push('\n');
    for dev in &sub.devices {
        out.push_str(&dev.instance);
        for net in &dev.nets {
            let _ = write!(out, " {}", net);
        }
        if let Some(model) = &dev.model {
            let _ = write!(out, " {}", model);
        }
        for (key, value) in &dev.params {
            match value {
                ParamValue::Value(v) => {
                    let _ = write!(out, " {}={}", key, v);
                }
                ParamValue::Flag => {
                    let _ = write!(out, " {}", key);
                }
            }
        }
        out.push('\n');
    }
    let _ = writeln!(out, ".ENDS {}", sub.name);
    out
}

pub fn netlist_to_string<'a>(subs: impl IntoIterator<Item = &'a Subcircuit>) -> String {
    subs.into_iter()
        .map(subcircuit_to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn write_netlist_file<'a>(
    path: impl AsRef<Path>,
    subs: impl IntoIterator<Item = &'a Subcircuit>,
) -> Result<(), NetlistError> {
    let path = path.as_ref();
    fs::write(path, netlist_to_string(subs)).map_err(|source| NetlistError::Write {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DeviceRecord;
    use crate::parser::parse_str;

    #[test]
    fn test_format_dimension() {
        assert_eq!(format_dimension(2.0), "2u");
        assert_eq!(format_dimension(0.18), "0.18u");
        assert_eq!(format_dimension(1.0000001), "1u");
    }

    #[test]
    fn test_written_block_parses_back() {
        let mut sub = Subcircuit::new("INV", vec!["A".into(), "Y".into(), "VDD".into(), "VSS".into()]);
        sub.devices.push(
            DeviceRecord::new(
                "M1",
                vec!["Y".into(), "A".into(), "VDD".into(), "VDD".into()],
                Some("PMOS".into()),
            )
            .with_param("W", &format_dimension(2.0))
            .with_param("L", &format_dimension(0.2))
            .with_param("nf", "1"),
        );
        let text = subcircuit_to_string(&sub);
        assert!(text.starts_with(".SUBCKT INV A Y VDD VSS\n"));
        assert!(text.contains("M1 Y A VDD VDD PMOS W=2u L=0.2u nf=1\n"));

        let parsed = parse_str(&text);
        assert_eq!(parsed.get("INV"), Some(&sub));
    }
}
