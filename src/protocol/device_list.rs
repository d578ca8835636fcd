// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device list services and their reply format.

use std::fmt;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::{ParseError, Result};
use crate::types::{Device, DeviceDetails, DeviceStatus};

use super::{AdbConnection, ConnectionCloser, SnapshotSource};

/// Server services that reply with device lists.
///
/// The one-shot listings answer once and then the server closes the
/// connection, so a tracker fed by one of them sees a single snapshot and
/// then fails with a premature end of stream. The tracking listings push a
/// new list every time the set of devices changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceListing {
    /// `host:devices`: one list of serials and statuses.
    Devices,
    /// `host:devices-l`: one list including device paths and details.
    DevicesWithPaths,
    /// `host:track-devices`: a list on every change.
    Track,
    /// `host:track-devices-l`: a detailed list on every change.
    TrackWithPaths,
}

impl DeviceListing {
    /// Returns the service request string.
    #[must_use]
    pub const fn command(&self) -> &'static str {
        match self {
            Self::Devices => "host:devices",
            Self::DevicesWithPaths => "host:devices-l",
            Self::Track => "host:track-devices",
            Self::TrackWithPaths => "host:track-devices-l",
        }
    }

    /// Returns `true` if replies use the long format.
    #[must_use]
    pub const fn is_long(&self) -> bool {
        matches!(self, Self::DevicesWithPaths | Self::TrackWithPaths)
    }

    /// Returns `true` if the server keeps sending lists.
    #[must_use]
    pub const fn is_continuous(&self) -> bool {
        matches!(self, Self::Track | Self::TrackWithPaths)
    }
}

impl fmt::Display for DeviceListing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.command())
    }
}

/// A [`SnapshotSource`] reading device lists from one server connection.
///
/// # Examples
///
/// ```no_run
/// use adb_tracker::Tracker;
/// use adb_tracker::protocol::{AdbConnection, DeviceListSource, DeviceListing};
/// use tokio::net::TcpStream;
///
/// # async fn example() -> adb_tracker::Result<()> {
/// let stream = TcpStream::connect("127.0.0.1:5037")
///     .await
///     .map_err(adb_tracker::ProtocolError::from)?;
/// let source = DeviceListSource::open(AdbConnection::new(stream), DeviceListing::Track).await?;
/// let tracker = Tracker::new(source);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct DeviceListSource<S> {
    connection: AdbConnection<S>,
    listing: DeviceListing,
}

impl<S> DeviceListSource<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Requests `listing` on `connection` and waits for the server to accept.
    ///
    /// # Errors
    ///
    /// Returns error if the request cannot be sent or the server refuses it.
    pub async fn open(mut connection: AdbConnection<S>, listing: DeviceListing) -> Result<Self> {
        connection.request(listing.command()).await?;
        tracing::debug!(listing = %listing, "Device listing opened");
        Ok(Self {
            connection,
            listing,
        })
    }

    /// Returns the listing this source reads.
    #[must_use]
    pub fn listing(&self) -> DeviceListing {
        self.listing
    }
}

impl<S> SnapshotSource for DeviceListSource<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn next_snapshot(&mut self) -> Result<Vec<Device>> {
        let payload = self.connection.read_value().await?;
        let text = String::from_utf8(payload).map_err(ParseError::from)?;
        let devices = parse_device_list(&text, self.listing.is_long())?;
        tracing::debug!(
            listing = %self.listing,
            count = devices.len(),
            "Received device list"
        );
        Ok(devices)
    }

    fn closer(&self) -> ConnectionCloser {
        self.connection.closer()
    }

    async fn close(&mut self) -> Result<()> {
        self.connection.shutdown().await?;
        Ok(())
    }
}

/// Parses the body of a device list reply.
///
/// Short replies hold one `serial<TAB>status` line per device. Long replies
/// separate fields with whitespace and append an optional path followed by
/// `key:value` details.
///
/// # Errors
///
/// Returns [`ParseError::MalformedDeviceLine`] for a line without a status.
///
/// # Examples
///
/// ```
/// use adb_tracker::protocol::parse_device_list;
/// use adb_tracker::types::DeviceStatus;
///
/// let devices = parse_device_list("emulator-5554\tdevice\nR58M123\toffline\n", false).unwrap();
/// assert_eq!(devices.len(), 2);
/// assert_eq!(devices[1].status, DeviceStatus::Offline);
/// ```
pub fn parse_device_list(body: &str, long: bool) -> std::result::Result<Vec<Device>, ParseError> {
    body.lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            if long {
                parse_long_line(line)
            } else {
                parse_short_line(line)
            }
        })
        .collect()
}

fn parse_short_line(line: &str) -> std::result::Result<Device, ParseError> {
    let malformed = || ParseError::MalformedDeviceLine(line.to_string());

    let (id, status) = line.split_once('\t').ok_or_else(malformed)?;
    let (id, status) = (id.trim(), status.trim());
    if id.is_empty() || status.is_empty() {
        return Err(malformed());
    }
    Ok(Device::new(id, status))
}

/// Keys adb prints after the status in long listings.
const DETAIL_KEYS: [&str; 4] = ["product", "model", "device", "transport_id"];

fn is_detail(token: &str) -> bool {
    token
        .split_once(':')
        .is_some_and(|(key, _)| key == "usb" || DETAIL_KEYS.contains(&key))
}

fn parse_long_line(line: &str) -> std::result::Result<Device, ParseError> {
    let malformed = || ParseError::MalformedDeviceLine(line.to_string());

    let mut tokens = line.split_whitespace();
    let id = tokens.next().ok_or_else(malformed)?;
    let first = tokens.next().ok_or_else(malformed)?;
    let rest: Vec<&str> = tokens.collect();

    // "no permissions" is followed by a free-form hint before the details
    let (status, details) = if first == "no" && rest.first() == Some(&"permissions") {
        let start = rest.iter().position(|token| is_detail(token)).unwrap_or(rest.len());
        (DeviceStatus::NoPermissions, &rest[start..])
    } else {
        (DeviceStatus::from(first), rest.as_slice())
    };

    let mut parsed = DeviceDetails::default();
    for token in details {
        match token.split_once(':') {
            Some(("product", value)) => parsed.product = Some(value.to_string()),
            Some(("model", value)) => parsed.model = Some(value.to_string()),
            Some(("device", value)) => parsed.device = Some(value.to_string()),
            Some(("transport_id", value)) => parsed.transport_id = value.parse().ok(),
            _ if parsed.path.is_none() => parsed.path = Some((*token).to_string()),
            _ => tracing::debug!(token = %token, "Ignoring unknown device detail"),
        }
    }

    let device = Device::new(id, status);
    Ok(if parsed.is_empty() {
        device
    } else {
        device.with_details(parsed)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, ProtocolError};
    use tokio::io::{AsyncReadExt, AsyncWriteExt, duplex};

    #[test]
    fn listing_commands() {
        assert_eq!(DeviceListing::Devices.command(), "host:devices");
        assert_eq!(DeviceListing::DevicesWithPaths.command(), "host:devices-l");
        assert_eq!(DeviceListing::Track.command(), "host:track-devices");
        assert!(DeviceListing::TrackWithPaths.is_long());
        assert!(DeviceListing::TrackWithPaths.is_continuous());
        assert!(!DeviceListing::DevicesWithPaths.is_continuous());
    }

    #[test]
    fn parse_empty_list() {
        assert!(parse_device_list("", false).unwrap().is_empty());
        assert!(parse_device_list("\n", true).unwrap().is_empty());
    }

    #[test]
    fn parse_short_lines() {
        let devices =
            parse_device_list("emulator-5554\tdevice\r\n192.168.1.20:5555\tunauthorized\n", false)
                .unwrap();

        assert_eq!(
            devices,
            [
                Device::new("emulator-5554", DeviceStatus::Device),
                Device::new("192.168.1.20:5555", DeviceStatus::Unauthorized),
            ]
        );
    }

    #[test]
    fn parse_short_line_without_tab_fails() {
        let err = parse_device_list("garbage\n", false).unwrap_err();
        assert!(matches!(err, ParseError::MalformedDeviceLine(line) if line == "garbage"));
    }

    #[test]
    fn parse_long_usb_line() {
        let body = "0123456789ABCDEF       device usb:1-1 product:razor model:Nexus_7 device:flo transport_id:3\n";
        let devices = parse_device_list(body, true).unwrap();

        let device = &devices[0];
        assert_eq!(device.id.as_str(), "0123456789ABCDEF");
        assert_eq!(device.status, DeviceStatus::Device);
        assert_eq!(device.path(), Some("usb:1-1"));
        let details = device.details.as_ref().unwrap();
        assert_eq!(details.model.as_deref(), Some("Nexus_7"));
        assert_eq!(details.product.as_deref(), Some("razor"));
        assert_eq!(details.device.as_deref(), Some("flo"));
        assert_eq!(details.transport_id, Some(3));
    }

    #[test]
    fn parse_long_emulator_line_has_no_path() {
        let body = "emulator-5554          offline product:sdk_gphone64 model:sdk_gphone64_x86_64 device:emu64xa transport_id:1";
        let devices = parse_device_list(body, true).unwrap();

        assert_eq!(devices[0].status, DeviceStatus::Offline);
        assert_eq!(devices[0].path(), None);
    }

    #[test]
    fn parse_long_no_permissions_line() {
        let body = "0123456789ABCDEF       no permissions (missing udev rules? user is in the plugdev group); see [http://developer.android.com/tools/device.html] usb:1-4 transport_id:7";
        let devices = parse_device_list(body, true).unwrap();

        assert_eq!(devices[0].status, DeviceStatus::NoPermissions);
        assert_eq!(devices[0].path(), Some("usb:1-4"));
        assert_eq!(devices[0].details.as_ref().unwrap().transport_id, Some(7));
    }

    #[test]
    fn parse_long_line_without_details() {
        let devices = parse_device_list("R58M123 sideload", true).unwrap();
        assert_eq!(devices[0], Device::new("R58M123", DeviceStatus::Sideload));
    }

    #[tokio::test]
    async fn source_reads_successive_lists() {
        let (client, mut server) = duplex(256);

        let server_task = tokio::spawn(async move {
            let mut request = [0u8; 22];
            server.read_exact(&mut request).await.unwrap();
            assert_eq!(&request, b"0012host:track-devices");
            server.write_all(b"OKAY").await.unwrap();
            server.write_all(b"0015emulator-5554\tdevice\n").await.unwrap();
            server.write_all(b"0000").await.unwrap();
            server
        });

        let mut source = DeviceListSource::open(AdbConnection::new(client), DeviceListing::Track)
            .await
            .unwrap();
        let _server = server_task.await.unwrap();
        assert_eq!(source.listing(), DeviceListing::Track);

        let first = source.next_snapshot().await.unwrap();
        assert_eq!(first, [Device::new("emulator-5554", DeviceStatus::Device)]);

        let second = source.next_snapshot().await.unwrap();
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn source_reports_premature_eof_when_server_hangs_up() {
        let (client, mut server) = duplex(256);
        server.write_all(b"OKAY0000").await.unwrap();

        let mut source = DeviceListSource::open(AdbConnection::new(client), DeviceListing::Devices)
            .await
            .unwrap();
        assert!(source.next_snapshot().await.unwrap().is_empty());

        drop(server);
        let err = source.next_snapshot().await.unwrap_err();
        assert!(err.is_premature_eof());
    }

    #[tokio::test]
    async fn source_open_surfaces_fail() {
        let (client, mut server) = duplex(256);
        server.write_all(b"FAIL0007refused").await.unwrap();

        let err = DeviceListSource::open(AdbConnection::new(client), DeviceListing::Devices)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Protocol(ProtocolError::Fail(msg)) if msg == "refused"));
    }

    #[tokio::test]
    async fn source_close_interrupts_read() {
        let (client, mut server) = duplex(256);
        server.write_all(b"OKAY").await.unwrap();

        let mut source = DeviceListSource::open(AdbConnection::new(client), DeviceListing::Track)
            .await
            .unwrap();
        let closer = source.closer();
        assert!(!closer.is_closed());

        closer.close();
        let err = source.next_snapshot().await.unwrap_err();
        assert!(err.is_closed_locally());
    }
}
