use lvs_core::cell::FlatCell;
use lvs_core::kernel::GeometryKernel;
use lvs_io::config::PinLayer;

use crate::geometry::Workspace;
use crate::netmap::NetMap;

/// Distinct label texts on the pin text layers, in pin-layer order then
/// label order.
pub fn collect_ports(flat: &FlatCell, pins: &[PinLayer]) -> Vec<String> {
    let mut ports: Vec<String> = Vec::new();
    for pin in pins {
        for label in flat.labels_on(pin.text) {
            if !label.text.is_empty() && !ports.contains(&label.text) {
                ports.push(label.text.clone());
            }
        }
    }
    ports
}

/// Name every metal polygon after the first pin label it covers. Returns the
/// number of polygons named.
pub fn bind_pin_labels(
    ws: &Workspace,
    flat: &FlatCell,
    pins: &[PinLayer],
    kernel: &GeometryKernel,
    netmap: &mut NetMap,
) -> usize {
    let mut bound = 0;
    for pin in pins {
        let labels: Vec<_> = flat
            .labels_on(pin.text)
            .filter(|l| !l.text.is_empty())
            .collect();
        if labels.is_empty() {
            continue;
        }
        for &id in ws.on_layer(pin.metal) {
            let poly = ws.get(id);
            let mut covering = labels.iter().filter(|l| kernel.covers(poly, &l.position));
            let Some(first) = covering.next() else {
                continue;
            };
            if netmap.assign(id, &first.text) {
                bound += 1;
            } else {
                log::warn!(
                    "Label '{}' ignored: polygon on {} is already named '{}'",
                    first.text,
                    pin.metal,
                    netmap.get(id).unwrap_or_default()
                );
            }
            for extra in covering.filter(|l| l.text != first.text) {
                log::warn!(
                    "Label '{}' ignored: polygon on {} is already named '{}'",
                    extra.text,
                    pin.metal,
                    netmap.get(id).unwrap_or_default()
                );
            }
        }
    }
    bound
}

/// Give every still-unnamed polygon a fresh `net<k>` placeholder that does
/// not collide with any label text.
pub fn assign_placeholders(ws: &Workspace, netmap: &mut NetMap) {
    let taken: std::collections::HashSet<String> =
        netmap.net_names().into_iter().map(|s| s.to_string()).collect();
    let mut counter = 1usize;
    for id in ws.ids() {
        if netmap.contains(id) {
            continue;
        }
        let name = loop {
            let candidate = format!("net{}", counter);
            counter += 1;
            if !taken.contains(&candidate) {
                break candidate;
            }
        };
        netmap.assign(id, &name);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use lvs_core::geometry::{Label, Point, Polygon};
    use lvs_core::layer::LayerSpec;

    const M1: LayerSpec = LayerSpec::new(7, 0);
    const TXT: LayerSpec = LayerSpec::new(8, 0);

    fn setup() -> (Workspace, FlatCell, Vec<PinLayer>) {
        let mut layers = BTreeMap::new();
        layers.insert(
            M1,
            vec![
                Polygon::rect(M1, 0.0, 0.0, 1.0, 1.0),
                Polygon::rect(M1, 2.0, 0.0, 3.0, 1.0),
                Polygon::rect(M1, 4.0, 0.0, 5.0, 1.0),
            ],
        );
        let ws = Workspace::from_layers(layers);
        let mut flat = FlatCell::new("t");
        flat.labels.push(Label::new(TXT, "A", Point::new(0.5, 0.5)));
        flat.labels.push(Label::new(TXT, "B", Point::new(1.0, 0.5)));
        flat.labels.push(Label::new(TXT, "net1", Point::new(2.5, 0.5)));
        flat.labels.push(Label::new(TXT, "A", Point::new(9.0, 9.0)));
        let pins = vec![PinLayer { text: TXT, metal: M1 }];
        (ws, flat, pins)
    }

    #[test]
    fn test_first_covering_label_names_polygon() {
        let (ws, flat, pins) = setup();
        let kernel = GeometryKernel::default();
        let mut netmap = NetMap::new();
        assert_eq!(bind_pin_labels(&ws, &flat, &pins, &kernel, &mut netmap), 2);
        assert_eq!(netmap.get(ws.on_layer(M1)[0]), Some("A"));
        assert_eq!(collect_ports(&flat, &pins), vec!["A", "B", "net1"]);
    }

    #[test]
    fn test_placeholders_avoid_label_names() {
        let (ws, flat, pins) = setup();
        let kernel = GeometryKernel::default();
        let mut netmap = NetMap::new();
        bind_pin_labels(&ws, &flat, &pins, &kernel, &mut netmap);
        assign_placeholders(&ws, &mut netmap);
        assert_eq!(netmap.len(), 3);
        assert_eq!(netmap.get(ws.on_layer(M1)[2]), Some("net2"));
    }
}
