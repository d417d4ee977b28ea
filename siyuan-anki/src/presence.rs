//! Process presence check against the OS process list.

use siyuan_anki_core::contract::ProcessProbe;
use sysinfo::System;

/// Lower-cased process names captured when the probe is built. Build a fresh probe
/// for every run.
pub struct SystemProcessProbe {
    names: Vec<String>,
}

impl SystemProcessProbe {
    pub fn snapshot() -> Self {
        let system = System::new_all();
        let names: Vec<String> = system
            .processes()
            .values()
            .map(|p| p.name().to_lowercase())
            .collect();
        tracing::debug!(processes = names.len(), "Captured process list");
        Self { names }
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            names: names.into_iter().map(|n| n.as_ref().to_lowercase()).collect(),
        }
    }
}

impl ProcessProbe for SystemProcessProbe {
    fn is_running(&self, name: &str) -> bool {
        let needle = name.to_lowercase();
        self.names.iter().any(|n| n.contains(&needle))
    }
}
