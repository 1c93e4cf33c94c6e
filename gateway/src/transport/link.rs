// Network link association backed by host interfaces.

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use if_addrs::get_if_addrs;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("no usable ipv4 interface")]
    NoInterface,
    #[error("interface query failed: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait Link: Send + Sync {
    async fn is_up(&self) -> bool;
    async fn associate(&self) -> Result<(), LinkError>;
    async fn release(&self);
}

/// Treats the link as up while a routable IPv4 interface exists.
#[derive(Debug, Default)]
pub struct InterfaceLink {
    allow_loopback: bool,
    associated: AtomicBool,
}

impl InterfaceLink {
    pub fn new(allow_loopback: bool) -> Self {
        Self {
            allow_loopback,
            associated: AtomicBool::new(false),
        }
    }

    fn usable_ipv4(&self) -> Result<Option<Ipv4Addr>, LinkError> {
        let ifaces = get_if_addrs()?;
        for iface in ifaces {
            if let if_addrs::IfAddr::V4(v4) = iface.addr {
                if usable(v4.ip, self.allow_loopback) {
                    return Ok(Some(v4.ip));
                }
            }
        }
        Ok(None)
    }
}

fn usable(ip: Ipv4Addr, allow_loopback: bool) -> bool {
    if ip.is_link_local() || ip.is_unspecified() {
        return false;
    }
    allow_loopback || !ip.is_loopback()
}

#[async_trait]
impl Link for InterfaceLink {
    async fn is_up(&self) -> bool {
        self.associated.load(Ordering::Relaxed) && matches!(self.usable_ipv4(), Ok(Some(_)))
    }

    async fn associate(&self) -> Result<(), LinkError> {
        let ip = self.usable_ipv4()?.ok_or(LinkError::NoInterface)?;
        self.associated.store(true, Ordering::Relaxed);
        info!(%ip, "link associated");
        Ok(())
    }

    async fn release(&self) {
        if self.associated.swap(false, Ordering::Relaxed) {
            debug!("link released");
        }
    }
}
