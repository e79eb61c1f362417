// Side panel describing the focused object.

use serde::Serialize;

use netatlas_entity::device;

use super::{Focus, Layer};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Field {
    pub label: String,
    pub value: String,
}

/// A drill-in target a client can request without building the query itself.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Relationship {
    pub label: String,
    pub layer: Layer,
    pub focus_type: &'static str,
    pub focus_id: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Inspector {
    pub identity: Vec<Field>,
    pub status: Vec<Field>,
    pub relationships: Vec<Relationship>,
}

impl Inspector {
    pub(crate) fn for_focus(focus: &Focus, layer: Layer, device: Option<&device::Model>) -> Self {
        let mut inspector = Inspector::default();
        inspector.identity("Type", focus.kind());
        inspector.identity("ID", focus.id());
        if let Some(device) = device {
            inspector.identity("Name", device_label(device));
            if let Some(owner) = device.owner.as_deref().filter(|o| !o.is_empty()) {
                inspector.identity("Owner", owner);
            }
            if let Some(location) = device.location.as_deref().filter(|l| !l.is_empty()) {
                inspector.identity("Location", location);
            }
        }
        inspector.status("Layer", layer.label());
        for other in Layer::ALL.iter().filter(|l| **l != layer) {
            inspector.relate(
                format!("View in {}", other.label()),
                *other,
                focus.kind(),
                focus.id(),
            );
        }
        inspector
    }

    fn identity(&mut self, label: &str, value: impl Into<String>) {
        self.identity.push(Field {
            label: label.to_string(),
            value: value.into(),
        });
    }

    pub(crate) fn status(&mut self, label: &str, value: impl Into<String>) {
        self.status.push(Field {
            label: label.to_string(),
            value: value.into(),
        });
    }

    pub(crate) fn relate(
        &mut self,
        label: impl Into<String>,
        layer: Layer,
        focus_type: &'static str,
        focus_id: impl Into<String>,
    ) {
        self.relationships.push(Relationship {
            label: label.into(),
            layer,
            focus_type,
            focus_id: focus_id.into(),
        });
    }
}

pub(crate) fn device_label(device: &device::Model) -> String {
    match device.display_name.as_deref().filter(|n| !n.is_empty()) {
        Some(name) => name.to_string(),
        None => format!("device {}", device.device_id),
    }
}

/// "2" when nothing was dropped, "2 of 5" otherwise.
pub(crate) fn count_of(returned: usize, total: Option<usize>) -> String {
    match total {
        Some(total) if total > returned => format!("{} of {}", returned, total),
        _ => returned.to_string(),
    }
}
