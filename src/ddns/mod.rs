//! Dynamic DNS for REG.RU, run as a network hook `(interface, action)`.
//!
//! Flow: filter the hook call, settle the WAN address (NAT aware), make
//! sure the domain is managed by the account, then create or replace the A
//! record when it does not already point at the WAN address.

pub mod ip;
pub mod regru;

use reqwest::Client;
use tracing::{info, warn};

use crate::config::DdnsConfig;
use crate::error::{Error, Result};

pub use regru::{build_api_url, RecordState, RegRuClient};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Hook call for another interface or action.
    Skipped,
    UpToDate { ip: String },
    Replaced { ip: String },
    Created { ip: String },
}

pub struct DdnsUpdater {
    config: DdnsConfig,
    api: RegRuClient,
    http: Client,
}

impl DdnsUpdater {
    pub fn new(config: DdnsConfig) -> Result<Self> {
        let api = RegRuClient::new(config.api.clone(), config.timeout)?;
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { config, api, http })
    }

    /// Hook entry point.
    pub async fn run(&self, interface: &str, action: &str) -> Result<Outcome> {
        if !self.config.accepts_hook(interface, action) {
            warn!(
                "Exiting due to foreign interface or action: {} [{}]",
                interface, action
            );
            return Ok(Outcome::Skipped);
        }

        let local = ip::local_wan_ip(
            &self.config.wan_interface,
            std::env::var(ip::DHCP_IP_ENV).ok(),
        )?;
        self.update(&local).await
    }

    /// Reconcile the record with `local_ip`, preferring the remote view under NAT.
    pub async fn update(&self, local_ip: &str) -> Result<Outcome> {
        info!("WAN IP is set to: {}", local_ip);
        let wan_ip = self.effective_wan_ip(local_ip).await?;

        let domain = &self.config.domain;
        let record = &self.config.record;

        if !self.api.domain_exists(domain).await? {
            return Err(Error::DomainNotFound(domain.clone()));
        }

        match self.api.record_state(domain, record, &wan_ip).await? {
            RecordState::UpToDate => {
                info!("Record update is not required: {} [{}]", record, wan_ip);
                Ok(Outcome::UpToDate { ip: wan_ip })
            }
            RecordState::Outdated => {
                info!("Record update is required: {} [{}]", record, wan_ip);
                if !self.api.record_delete(domain, record).await? {
                    return Err(Error::DnsApi(format!(
                        "Failed to delete outdated record: {}",
                        record
                    )));
                }
                info!("Outdated record was deleted: {}", record);
                self.create(&wan_ip).await?;
                Ok(Outcome::Replaced { ip: wan_ip })
            }
            RecordState::Missing => {
                info!("Record does not exist for: {} [{}]", record, wan_ip);
                self.create(&wan_ip).await?;
                Ok(Outcome::Created { ip: wan_ip })
            }
        }
    }

    async fn effective_wan_ip(&self, local_ip: &str) -> Result<String> {
        let url = build_api_url(&self.config.remote_ip_url, &self.config.remote_ip_path)?;
        let remote = ip::remote_ip(&self.http, url.as_str()).await?;

        if remote != local_ip {
            info!("NAT is detected: {} <-> {}", local_ip, remote);
            info!("WAN IP is updated to: {}", remote);
            return Ok(remote);
        }
        Ok(local_ip.to_string())
    }

    async fn create(&self, wan_ip: &str) -> Result<()> {
        let record = &self.config.record;
        if self
            .api
            .record_create(&self.config.domain, record, wan_ip)
            .await?
        {
            info!("Record has been created: {} [{}]", record, wan_ip);
            Ok(())
        } else {
            Err(Error::DnsApi(format!(
                "Failed to create record: {} [{}]",
                record, wan_ip
            )))
        }
    }
}
