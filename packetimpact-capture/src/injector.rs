//! Raw frame injection through a pnet datalink channel

use crate::interface::find_interface;
use packetimpact_core::{Error, Injector, Result};
use pnet_datalink::{self, Channel, DataLinkSender};
use tracing::{debug, info};

/// Sends frames unmodified on one network interface
pub struct DatalinkInjector {
    interface: String,
    sender: Option<Box<dyn DataLinkSender>>,
}

impl DatalinkInjector {
    /// Open a datalink channel on `interface`
    pub fn new(interface: &str) -> Result<Self> {
        let iface = find_interface(interface)?;

        let sender = match pnet_datalink::channel(&iface, Default::default()) {
            Ok(Channel::Ethernet(tx, _)) => tx,
            Ok(_) => return Err(Error::Interface("Unsupported channel type".to_string())),
            Err(e) => return Err(Error::Interface(format!("Failed to create channel: {}", e))),
        };

        info!("Opened injector on interface: {}", interface);
        Ok(Self {
            interface: interface.to_string(),
            sender: Some(sender),
        })
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }
}

impl Injector for DatalinkInjector {
    fn send(&mut self, frame: &[u8]) -> Result<()> {
        let sender = self
            .sender
            .as_mut()
            .ok_or_else(|| Error::Interface(format!("injector on {} is closed", self.interface)))?;

        sender
            .send_to(frame, None)
            .ok_or_else(|| Error::Interface("Failed to send packet".to_string()))?
            .map_err(|e| Error::Interface(format!("Send error: {}", e)))?;

        debug!("Injected {} bytes on {}", frame.len(), self.interface);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.sender.take().is_some() {
            info!("Closed injector on interface: {}", self.interface);
        }
        Ok(())
    }
}
