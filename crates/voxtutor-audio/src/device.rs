use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Device, Host};
use voxtutor_core::AudioError;

const DEFAULT_DEVICE: &str = "default";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Input,
    Output,
}

impl Direction {
    fn label(self) -> &'static str {
        match self {
            Direction::Input => "input",
            Direction::Output => "output",
        }
    }
}

pub struct DeviceManager {
    host: Host,
}

impl Default for DeviceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceManager {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }

    pub fn host_name(&self) -> &'static str {
        self.host.id().name()
    }

    pub fn list_input_devices(&self) -> Result<Vec<(String, Device)>, AudioError> {
        self.list(Direction::Input)
    }

    pub fn list_output_devices(&self) -> Result<Vec<(String, Device)>, AudioError> {
        self.list(Direction::Output)
    }

    /// Look up a microphone by name; `"default"` selects the host default.
    pub fn get_input_device(&self, name: &str) -> Result<Device, AudioError> {
        self.find(Direction::Input, name)
    }

    /// Look up a speaker by name; `"default"` selects the host default.
    pub fn get_output_device(&self, name: &str) -> Result<Device, AudioError> {
        self.find(Direction::Output, name)
    }

    fn list(&self, direction: Direction) -> Result<Vec<(String, Device)>, AudioError> {
        let devices: Vec<Device> = match direction {
            Direction::Input => self.host.input_devices().map(|d| d.collect()),
            Direction::Output => self.host.output_devices().map(|d| d.collect()),
        }
        .map_err(|e| AudioError::DeviceEnumeration(e.to_string()))?;

        Ok(devices
            .into_iter()
            .map(|device| {
                let name = device.name().unwrap_or_else(|_| "unknown".to_string());
                (name, device)
            })
            .collect())
    }

    fn find(&self, direction: Direction, name: &str) -> Result<Device, AudioError> {
        if name == DEFAULT_DEVICE {
            let device = match direction {
                Direction::Input => self.host.default_input_device(),
                Direction::Output => self.host.default_output_device(),
            };
            return device.ok_or_else(|| {
                AudioError::DeviceNotFound(format!("no default {} device", direction.label()))
            });
        }

        self.list(direction)?
            .into_iter()
            .find(|(dev_name, _)| dev_name == name)
            .map(|(_, device)| device)
            .ok_or_else(|| {
                AudioError::DeviceNotFound(format!(
                    "{} device not found: {}",
                    direction.label(),
                    name
                ))
            })
    }
}
