//! Built-in avatar model catalog.

use serde::Serialize;

pub const DEFAULT_MODEL_ID: &str = "carlotta.vrm";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModelInfo {
    pub id: &'static str,
    pub name: &'static str,
}

pub const MODELS: [ModelInfo; 10] = [
    ModelInfo { id: "yangyang.vrm", name: "Yangyang" },
    ModelInfo { id: "chixia.vrm", name: "Chixia" },
    ModelInfo { id: "jinshi.vrm", name: "Jinshi" },
    ModelInfo { id: "yinlin.vrm", name: "Yinlin" },
    ModelInfo { id: "frover.vrm", name: "Frover" },
    ModelInfo { id: "phoebe.vrm", name: "Phoebe" },
    ModelInfo { id: "cantarella.vrm", name: "Cantarella" },
    ModelInfo { id: "carlotta.vrm", name: "Carlotta" },
    ModelInfo { id: "carthetiya.vrm", name: "Carthetiya" },
    ModelInfo { id: "fleurdelys.vrm", name: "Fleurdelys" },
];

pub fn find(id: &str) -> Option<&'static ModelInfo> {
    MODELS.iter().find(|m| m.id == id)
}
