//! Input port table and the presentation-facing input catalog.
//!
//! The port table is fixed at construction; its order defines the 1-based
//! input numbers used by [`set_input`](crate::PlanarQe::set_input).

use planar_core::types::{ConnectionKind, SignalType};

use crate::commands::Source;

/// One physical or internal input of the display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputPort {
    /// Unique key, e.g. `hdmiIn2`.
    pub key: String,
    /// Label for UIs, e.g. `HDMI 2`.
    pub display_name: String,
    pub signal: SignalType,
    pub connection: ConnectionKind,
    /// Wire source to route to, absent for ports that cannot be selected.
    pub selector: Option<Source>,
    /// Lower-case value the display reports in `source.select` for this port.
    pub feedback_token: String,
}

impl InputPort {
    pub fn new(
        key: &str,
        display_name: &str,
        signal: SignalType,
        connection: ConnectionKind,
        selector: Option<Source>,
        feedback_token: &str,
    ) -> Self {
        InputPort {
            key: key.to_string(),
            display_name: display_name.to_string(),
            signal,
            connection,
            selector,
            feedback_token: feedback_token.to_ascii_lowercase(),
        }
    }
}

/// The QE series port table.
///
/// With `supports_usb` the USB-C port comes first and shifts every other
/// input number up by one. It has no selector: the display switches to it
/// on its own when a host attaches.
pub fn standard_ports(supports_usb: bool) -> Vec<InputPort> {
    let mut ports = Vec::with_capacity(7);

    if supports_usb {
        ports.push(InputPort::new(
            "usb",
            "USB",
            SignalType::USB_INPUT | SignalType::USB_OUTPUT,
            ConnectionKind::UsbC,
            None,
            "usb",
        ));
    }

    for n in 1..=4u8 {
        ports.push(InputPort::new(
            &format!("hdmiIn{n}"),
            &format!("HDMI {n}"),
            SignalType::AUDIO_VIDEO,
            ConnectionKind::Hdmi,
            Some(Source::Hdmi(n)),
            &format!("hdmi.{n}"),
        ));
    }

    ports.push(InputPort::new(
        "displayPortIn1",
        "DisplayPort 1",
        SignalType::AUDIO_VIDEO,
        ConnectionKind::DisplayPort,
        Some(Source::DisplayPort),
        "dp",
    ));
    ports.push(InputPort::new(
        "ipcOps",
        "OPS",
        SignalType::AUDIO_VIDEO,
        ConnectionKind::None,
        Some(Source::Ops),
        "ops",
    ));

    ports
}

/// One entry of the [`InputCatalog`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogItem {
    pub key: String,
    pub name: String,
    pub selected: bool,
}

/// Selectable-item view of the inputs for UI pickers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputCatalog {
    items: Vec<CatalogItem>,
    current: Option<String>,
}

impl InputCatalog {
    pub fn from_ports(ports: &[InputPort]) -> Self {
        InputCatalog {
            items: ports
                .iter()
                .map(|p| CatalogItem {
                    key: p.key.clone(),
                    name: p.display_name.clone(),
                    selected: false,
                })
                .collect(),
            current: None,
        }
    }

    pub fn items(&self) -> &[CatalogItem] {
        &self.items
    }

    pub fn current_key(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Mark `key` as the only selected item. Unknown keys leave it unchanged.
    pub fn select(&mut self, key: &str) -> bool {
        if !self.items.iter().any(|item| item.key == key) {
            return false;
        }
        for item in &mut self.items {
            item.selected = item.key == key;
        }
        self.current = Some(key.to_string());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(ports: &[InputPort]) -> Vec<&str> {
        ports.iter().map(|p| p.key.as_str()).collect()
    }

    #[test]
    fn standard_ports_without_usb() {
        let ports = standard_ports(false);
        assert_eq!(
            keys(&ports),
            vec!["hdmiIn1", "hdmiIn2", "hdmiIn3", "hdmiIn4", "displayPortIn1", "ipcOps"]
        );
        assert_eq!(ports[1].display_name, "HDMI 2");
        assert_eq!(ports[1].feedback_token, "hdmi.2");
        assert_eq!(ports[4].selector, Some(Source::DisplayPort));
        assert_eq!(ports[5].connection, ConnectionKind::None);
    }

    #[test]
    fn standard_ports_with_usb_first() {
        let ports = standard_ports(true);
        assert_eq!(ports.len(), 7);
        assert_eq!(ports[0].key, "usb");
        assert_eq!(ports[0].selector, None);
        assert!(ports[0].signal.contains(SignalType::USB_INPUT));
        assert_eq!(ports[1].key, "hdmiIn1");
    }

    #[test]
    fn feedback_tokens_are_unique() {
        let ports = standard_ports(true);
        let mut tokens: Vec<&str> = ports.iter().map(|p| p.feedback_token.as_str()).collect();
        tokens.sort_unstable();
        tokens.dedup();
        assert_eq!(tokens.len(), ports.len());
    }

    #[test]
    fn port_token_is_lower_cased() {
        let port = InputPort::new(
            "custom",
            "Custom",
            SignalType::VIDEO,
            ConnectionKind::Hdmi,
            Some(Source::Hdmi(1)),
            "HDMI.1",
        );
        assert_eq!(port.feedback_token, "hdmi.1");
    }

    #[test]
    fn catalog_selection_is_exclusive() {
        let mut catalog = InputCatalog::from_ports(&standard_ports(false));
        assert_eq!(catalog.current_key(), None);
        assert!(catalog.items().iter().all(|item| !item.selected));

        assert!(catalog.select("hdmiIn3"));
        assert!(catalog.select("ipcOps"));
        let selected: Vec<&str> = catalog
            .items()
            .iter()
            .filter(|item| item.selected)
            .map(|item| item.key.as_str())
            .collect();
        assert_eq!(selected, vec!["ipcOps"]);
        assert_eq!(catalog.current_key(), Some("ipcOps"));
    }

    #[test]
    fn catalog_ignores_unknown_key() {
        let mut catalog = InputCatalog::from_ports(&standard_ports(false));
        catalog.select("hdmiIn1");
        assert!(!catalog.select("vga"));
        assert_eq!(catalog.current_key(), Some("hdmiIn1"));
    }
}
