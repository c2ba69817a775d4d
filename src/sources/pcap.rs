//! Pcap stream source
//!
//! Reads the classic libpcap format as produced by `tcpdump -U -w -` on the device
//! and yields the UDP datagrams it contains. Only IPv4 is decoded; IPv6, non-UDP
//! traffic and non-first IPv4 fragments (which carry no UDP header) are skipped.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use slatewire::sources::pcap::{PcapSource, capture_command};
//! use slatewire::CaptureSource;
//!
//! # async fn run(stdout: impl tokio::io::AsyncRead + Unpin + Send + 'static) -> slatewire::Result<()> {
//! // Run this on the device and pipe its stdout back.
//! let command = capture_command("eth0", &[6250, 6251]);
//! assert_eq!(command, "tcpdump -i eth0 -U -n -w - udp port '(6250 or 6251)'");
//!
//! let mut source = PcapSource::new(stdout).await?;
//! while let Some(record) = source.next_record().await? {
//!     println!("{} bytes to port {}", record.payload.len(), record.port);
//! }
//! # Ok(())
//! # }
//! ```

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info, trace};

use crate::source::CaptureSource;
use crate::types::CapturedRecord;
use crate::{Result, SlateError};

/// Largest record accepted before the stream is considered corrupt.
pub const MAX_RECORD_LEN: usize = 256 * 1024;

const GLOBAL_HEADER_LEN: usize = 24;
const RECORD_HEADER_LEN: usize = 16;

const IPPROTO_UDP: u8 = 17;
const ETHERTYPE_IPV4: u16 = 0x0800;
const ETHERTYPE_VLAN: u16 = 0x8100;
const ETHERTYPE_QINQ: u16 = 0x88A8;

/// Link-layer header types understood by [`PcapSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkType {
    /// BSD loopback (`DLT_NULL`)
    Null,
    /// Ethernet II, optionally VLAN tagged
    Ethernet,
    /// Raw IP, no link header
    Raw,
    /// Linux cooked capture v1 (`-i any`)
    LinuxSll,
    /// Linux cooked capture v2
    LinuxSll2,
}

impl LinkType {
    /// Map a pcap `network` value.
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(LinkType::Null),
            1 => Some(LinkType::Ethernet),
            12 | 101 | 228 => Some(LinkType::Raw),
            113 => Some(LinkType::LinuxSll),
            276 => Some(LinkType::LinuxSll2),
            _ => None,
        }
    }
}

/// Byte order of the stream, taken from its magic number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endian {
    Little,
    Big,
}

impl Endian {
    fn u32(self, bytes: &[u8]) -> u32 {
        let raw = [bytes[0], bytes[1], bytes[2], bytes[3]];
        match self {
            Endian::Little => u32::from_le_bytes(raw),
            Endian::Big => u32::from_be_bytes(raw),
        }
    }
}

/// Build the remote command producing a pcap stream for `ports` on `interface`.
pub fn capture_command(interface: &str, ports: &[u16]) -> String {
    let ports = ports.iter().map(u16::to_string).collect::<Vec<_>>().join(" or ");
    format!("tcpdump -i {interface} -U -n -w - udp port '({ports})'")
}

/// Extract the UDP destination port and payload from one captured frame.
pub fn udp_datagram(link_type: LinkType, frame: &[u8]) -> Option<CapturedRecord> {
    let ip = match link_type {
        LinkType::Raw => frame,
        LinkType::Null => {
            // Address family in host byte order; AF_INET is 2 everywhere.
            let family = frame.get(..4)?;
            if family != [2, 0, 0, 0] && family != [0, 0, 0, 2] {
                return None;
            }
            frame.get(4..)?
        }
        LinkType::Ethernet => {
            let mut offset = 12;
            let mut ethertype = be_u16(frame, offset)?;
            while ethertype == ETHERTYPE_VLAN || ethertype == ETHERTYPE_QINQ {
                offset += 4;
                ethertype = be_u16(frame, offset)?;
            }
            if ethertype != ETHERTYPE_IPV4 {
                return None;
            }
            frame.get(offset + 2..)?
        }
        LinkType::LinuxSll => {
            if be_u16(frame, 14)? != ETHERTYPE_IPV4 {
                return None;
            }
            frame.get(16..)?
        }
        LinkType::LinuxSll2 => {
            if be_u16(frame, 0)? != ETHERTYPE_IPV4 {
                return None;
            }
            frame.get(20..)?
        }
    };

    ipv4_udp(ip)
}

fn ipv4_udp(ip: &[u8]) -> Option<CapturedRecord> {
    let version_ihl = *ip.first()?;
    if version_ihl >> 4 != 4 {
        return None;
    }
    let header_len = usize::from(version_ihl & 0x0F) * 4;
    if header_len < 20 || *ip.get(9)? != IPPROTO_UDP {
        return None;
    }

    let fragment_offset = be_u16(ip, 6)? & 0x1FFF;
    if fragment_offset != 0 {
        trace!(fragment_offset, "Skipping non-first IPv4 fragment");
        return None;
    }

    let total_len = usize::from(be_u16(ip, 2)?);
    let ip = if total_len >= header_len { &ip[..total_len.min(ip.len())] } else { ip };

    let udp = ip.get(header_len..)?;
    let port = be_u16(udp, 2)?;
    let udp_len = usize::from(be_u16(udp, 4)?);
    let end = if udp_len >= 8 { udp_len.min(udp.len()) } else { udp.len() };
    let payload = udp.get(8..end)?;

    Some(CapturedRecord::new(port, payload))
}

fn be_u16(data: &[u8], offset: usize) -> Option<u16> {
    let bytes = data.get(offset..offset + 2)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}

/// Capture source reading a libpcap stream.
pub struct PcapSource<R> {
    reader: R,
    endian: Endian,
    link_type: LinkType,
    frames: u64,
    yielded: u64,
}

impl<R> PcapSource<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    /// Read the global header and prepare to stream records.
    pub async fn new(mut reader: R) -> Result<Self> {
        let mut header = [0u8; GLOBAL_HEADER_LEN];
        reader.read_exact(&mut header).await.map_err(|e| {
            SlateError::capture_failed_with_source("Cannot read pcap header", Box::new(e))
        })?;

        let endian = match header[..4] {
            [0xD4, 0xC3, 0xB2, 0xA1] | [0x4D, 0x3C, 0xB2, 0xA1] => Endian::Little,
            [0xA1, 0xB2, 0xC3, 0xD4] | [0xA1, 0xB2, 0x3C, 0x4D] => Endian::Big,
            _ => {
                return Err(SlateError::Parse {
                    context: "pcap header".to_string(),
                    details: format!("unrecognised magic {:02x?}", &header[..4]),
                });
            }
        };

        let network = endian.u32(&header[20..24]);
        let link_type = LinkType::from_code(network).ok_or_else(|| SlateError::Parse {
            context: "pcap header".to_string(),
            details: format!("unsupported link type {network}"),
        })?;

        info!(?link_type, ?endian, "Pcap stream opened");
        Ok(Self { reader, endian, link_type, frames: 0, yielded: 0 })
    }

    /// Link type declared by the stream.
    pub fn link_type(&self) -> LinkType {
        self.link_type
    }

    /// Frames read so far, including skipped ones.
    pub fn frames_read(&self) -> u64 {
        self.frames
    }

    async fn next_frame(&mut self) -> Result<Option<Vec<u8>>> {
        let mut header = [0u8; RECORD_HEADER_LEN];
        match self.reader.read_exact(&mut header).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                debug!(frames = self.frames, "Pcap stream ended");
                return Ok(None);
            }
            Err(e) => {
                return Err(SlateError::capture_failed_with_source(
                    "Cannot read pcap record header",
                    Box::new(e),
                ));
            }
        }

        let captured_len = self.endian.u32(&header[8..12]) as usize;
        if captured_len > MAX_RECORD_LEN {
            // Record boundaries are lost past this point
            return Err(SlateError::Parse {
                context: "pcap record".to_string(),
                details: format!("record of {captured_len} bytes exceeds {MAX_RECORD_LEN}"),
            });
        }

        let mut frame = vec![0u8; captured_len];
        match self.reader.read_exact(&mut frame).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                debug!(frames = self.frames, "Pcap stream ended inside a record");
                return Ok(None);
            }
            Err(e) => {
                return Err(SlateError::capture_failed_with_source(
                    "Cannot read pcap record",
                    Box::new(e),
                ));
            }
        }

        self.frames += 1;
        Ok(Some(frame))
    }
}

#[async_trait::async_trait]
impl<R> CaptureSource for PcapSource<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    async fn next_record(&mut self) -> Result<Option<CapturedRecord>> {
        while let Some(frame) = self.next_frame().await? {
            if let Some(record) = udp_datagram(self.link_type, &frame) {
                self.yielded += 1;
                return Ok(Some(record));
            }
            trace!(len = frame.len(), "Skipping frame without an IPv4 UDP datagram");
        }
        Ok(None)
    }

    fn describe(&self) -> String {
        format!("pcap stream ({:?})", self.link_type)
    }
}
