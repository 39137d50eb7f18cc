pub mod run;

use crate::exporter::ExporterSettings;

pub enum Action {
    Run {
        port: u16,
        listen: Option<String>,
        settings: ExporterSettings,
    },
}
