// Live state for one discovered database service.

use super::model::{ActionMode, ControlAction, EngineDescriptor, ServiceState};
use super::systemd::ServiceManager;
use anyhow::Result;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct ServiceRow {
    engine: EngineDescriptor,
    unit: String,
    pid: Option<u32>,
    /// Only ever set while `pid` is.
    port: Option<u16>,
    status: String,
}

impl ServiceRow {
    pub fn new(engine: EngineDescriptor, unit: String) -> Self {
        Self {
            engine,
            unit,
            pid: None,
            port: None,
            status: String::new(),
        }
    }

    pub fn engine(&self) -> &EngineDescriptor {
        &self.engine
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    #[cfg(test)]
    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn state(&self) -> ServiceState {
        ServiceState::from_status(&self.status)
    }

    pub fn control(&self) -> ControlAction {
        ControlAction::for_state(self.state())
    }

    /// Re-reads status, main PID and listening port from the live system.
    pub fn refresh<M: ServiceManager>(&mut self, manager: &M) {
        self.status = manager.active_state(&self.unit);
        self.pid = manager.main_pid(&self.unit);
        self.port = match self.pid {
            Some(pid) => manager.listening_port(pid),
            None => None,
        };
    }

    /// Presses the row's control, then refreshes exactly once.
    ///
    /// In `Verify` mode a failed or denied command is returned after the
    /// refresh; otherwise its outcome is ignored.
    pub fn trigger<M: ServiceManager>(&mut self, manager: &M, mode: ActionMode) -> Result<()> {
        let action = self.control();
        let outcome = manager.control(&self.unit, action);
        self.refresh(manager);

        match (mode, outcome) {
            (ActionMode::Verify, Err(e)) => {
                warn!("{} {}: {:#}", action.verb(), self.unit, e);
                Err(e)
            }
            (_, outcome) => {
                if let Err(e) = outcome {
                    info!("ignoring outcome of {} {}: {:#}", action.verb(), self.unit, e);
                }
                Ok(())
            }
        }
    }

    /// `"<name> : <port>"` when a port is known, else just the name.
    pub fn title(&self) -> String {
        match self.port {
            Some(port) => format!("{} : {}", self.engine.name, port),
            None => self.engine.name.clone(),
        }
    }

    pub fn status_text(&self) -> &str {
        match self.state() {
            ServiceState::Active => "running",
            _ => &self.status,
        }
    }
}

/// Resolves one unit per engine; engines without a unit are skipped.
pub fn discover<M: ServiceManager>(engines: &[EngineDescriptor], manager: &M) -> Vec<ServiceRow> {
    engines
        .iter()
        .filter_map(|engine| {
            manager
                .find_unit(&engine.unit_prefixes)
                .map(|unit| ServiceRow::new(engine.clone(), unit))
        })
        .collect()
}
