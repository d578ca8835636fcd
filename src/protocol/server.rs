// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! TCP access to a local ADB server.

use std::time::Duration;

use tokio::net::TcpStream;

use crate::error::{Error, ProtocolError, Result};
use crate::tracker::Tracker;
use crate::types::Device;

use super::{AdbConnection, DeviceListSource, DeviceListing, SnapshotSource};

/// Port the ADB server listens on unless told otherwise.
pub const DEFAULT_PORT: u16 = 5037;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const ENV_ADDRESS: &str = "ANDROID_ADB_SERVER_ADDRESS";
const ENV_PORT: &str = "ANDROID_ADB_SERVER_PORT";

/// Connection parameters for an ADB server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    host: String,
    port: u16,
    connect_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl ServerConfig {
    /// Reads `ANDROID_ADB_SERVER_ADDRESS` and `ANDROID_ADB_SERVER_PORT`,
    /// falling back to the defaults for unset variables.
    ///
    /// # Errors
    ///
    /// Returns error if the port variable is not a valid port number.
    pub fn from_env() -> Result<Self> {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with a custom variable lookup.
    ///
    /// # Errors
    ///
    /// Returns error if the port variable is not a valid port number.
    pub fn from_env_with<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(host) = lookup(ENV_ADDRESS).filter(|host| !host.trim().is_empty()) {
            config.host = host.trim().to_string();
        }
        if let Some(port) = lookup(ENV_PORT) {
            config.port = port.trim().parse().map_err(|_| {
                Error::InvalidConfig(format!("{ENV_PORT} is not a valid port: {port:?}"))
            })?;
        }

        Ok(config)
    }

    /// Returns the server host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the server port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns the connect timeout.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Returns `host:port`.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Builder for [`AdbServer`].
#[derive(Debug, Default)]
pub struct AdbServerBuilder {
    host: Option<String>,
    port: Option<u16>,
    connect_timeout: Option<Duration>,
}

impl AdbServerBuilder {
    /// Creates a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the server host.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Sets the server port.
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets how long to wait for the TCP connection.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Builds the server handle.
    ///
    /// # Errors
    ///
    /// Returns error if the host is empty.
    pub fn build(self) -> Result<AdbServer> {
        let defaults = ServerConfig::default();

        let host = self.host.unwrap_or(defaults.host);
        if host.trim().is_empty() {
            return Err(Error::InvalidConfig("host must not be empty".to_string()));
        }

        Ok(AdbServer {
            config: ServerConfig {
                host,
                port: self.port.unwrap_or(defaults.port),
                connect_timeout: self.connect_timeout.unwrap_or(defaults.connect_timeout),
            },
        })
    }
}

/// Handle to an ADB server reachable over TCP.
///
/// Each call opens its own connection; the server serves one service per
/// connection.
///
/// # Examples
///
/// ```no_run
/// use adb_tracker::{AdbServer, Subscribable};
///
/// # async fn example() -> adb_tracker::Result<()> {
/// let server = AdbServer::builder().port(5037).build()?;
///
/// for device in server.list_devices().await? {
///     println!("{} {}", device.id, device.status);
/// }
///
/// let tracker = server.track_devices().await?;
/// tracker.on_online(|device| println!("online: {}", device.id));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct AdbServer {
    config: ServerConfig,
}

impl Default for AdbServer {
    fn default() -> Self {
        Self::new(ServerConfig::default())
    }
}

impl AdbServer {
    /// Creates a handle for the given configuration.
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Creates a handle configured from the environment.
    ///
    /// # Errors
    ///
    /// Returns error if `ANDROID_ADB_SERVER_PORT` is not a valid port.
    pub fn from_env() -> Result<Self> {
        ServerConfig::from_env().map(Self::new)
    }

    /// Creates a builder.
    #[must_use]
    pub fn builder() -> AdbServerBuilder {
        AdbServerBuilder::new()
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Opens a new connection to the server.
    ///
    /// # Errors
    ///
    /// Returns error if the server is unreachable or does not answer in time.
    pub async fn connect(&self) -> Result<AdbConnection<TcpStream>> {
        let address = self.config.address();
        let timeout = self.config.connect_timeout;

        let stream = tokio::time::timeout(timeout, TcpStream::connect(&address))
            .await
            .map_err(|_| {
                ProtocolError::Timeout(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX))
            })?
            .map_err(|e| ProtocolError::ConnectionFailed(format!("{address}: {e}")))?;

        // Device lists are small and latency matters more than batching
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(error = %e, "Failed to set TCP_NODELAY");
        }

        tracing::info!(address = %address, "Connected to ADB server");
        Ok(AdbConnection::new(stream))
    }

    /// Opens a connection and requests `listing` on it.
    ///
    /// # Errors
    ///
    /// Returns error if connecting fails or the server refuses the service.
    pub async fn open_listing(&self, listing: DeviceListing) -> Result<DeviceListSource<TcpStream>> {
        let connection = self.connect().await?;
        DeviceListSource::open(connection, listing).await
    }

    /// Returns the devices currently attached to the server.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the reply is malformed.
    pub async fn list_devices(&self) -> Result<Vec<Device>> {
        self.list_once(DeviceListing::Devices).await
    }

    /// Returns the attached devices including their paths and details.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the reply is malformed.
    pub async fn list_devices_with_paths(&self) -> Result<Vec<Device>> {
        self.list_once(DeviceListing::DevicesWithPaths).await
    }

    /// Starts tracking devices on a dedicated connection.
    ///
    /// # Errors
    ///
    /// Returns error if the tracking service cannot be opened.
    pub async fn track_devices(&self) -> Result<Tracker> {
        self.tracker(DeviceListing::Track).await
    }

    /// Starts tracking devices with paths and details.
    ///
    /// # Errors
    ///
    /// Returns error if the tracking service cannot be opened.
    pub async fn track_devices_with_paths(&self) -> Result<Tracker> {
        self.tracker(DeviceListing::TrackWithPaths).await
    }

    /// Starts a tracker fed by any listing.
    ///
    /// One-shot listings deliver a single snapshot; the server then closes
    /// the connection and the tracker ends with [`Error::ConnectionClosed`].
    ///
    /// # Errors
    ///
    /// Returns error if the service cannot be opened.
    pub async fn tracker(&self, listing: DeviceListing) -> Result<Tracker> {
        let source = self.open_listing(listing).await?;
        Ok(Tracker::new(source))
    }

    async fn list_once(&self, listing: DeviceListing) -> Result<Vec<Device>> {
        let mut source = self.open_listing(listing).await?;
        let devices = source.next_snapshot().await?;
        if let Err(e) = source.close().await {
            tracing::debug!(error = %e, "Ignoring close failure after device list");
        }
        Ok(devices)
    }
}
