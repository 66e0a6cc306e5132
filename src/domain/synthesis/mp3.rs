//! Minimal MPEG audio Layer III frame walker.
//!
//! Only what joining provider output needs: tag stripping, frame boundaries,
//! stream format and sample counts. Frame payloads are never decoded.

use std::fmt;

const ID3V2_HEADER_LEN: usize = 10;
const ID3V1_TAG_LEN: usize = 128;

const BITRATES_V1_L3: [u32; 15] = [0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320];
const BITRATES_V2_L3: [u32; 15] = [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpegVersion {
    V1,
    V2,
    V2_5,
}

impl fmt::Display for MpegVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MpegVersion::V1 => write!(f, "MPEG-1"),
            MpegVersion::V2 => write!(f, "MPEG-2"),
            MpegVersion::V2_5 => write!(f, "MPEG-2.5"),
        }
    }
}

/// The properties two streams must share to be joined frame by frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFormat {
    pub version: MpegVersion,
    pub sample_rate: u32,
    pub channels: u8,
}

impl fmt::Display for StreamFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} layer III {} Hz {}",
            self.version,
            self.sample_rate,
            if self.channels == 1 { "mono" } else { "stereo" }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FrameHeader {
    format: StreamFormat,
    protected: bool,
    length: usize,
    samples: u32,
}

impl FrameHeader {
    fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 4 || bytes[0] != 0xFF || bytes[1] & 0xE0 != 0xE0 {
            return None;
        }

        let version = match (bytes[1] >> 3) & 0b11 {
            0b00 => MpegVersion::V2_5,
            0b10 => MpegVersion::V2,
            0b11 => MpegVersion::V1,
            _ => return None,
        };
        // Layer III only
        if (bytes[1] >> 1) & 0b11 != 0b01 {
            return None;
        }
        let protected = bytes[1] & 0x01 == 0;

        let bitrate_index = (bytes[2] >> 4) as usize;
        let sample_rate_index = ((bytes[2] >> 2) & 0b11) as usize;
        if bitrate_index == 0 || bitrate_index == 0b1111 || sample_rate_index == 0b11 {
            return None;
        }
        let padding = ((bytes[2] >> 1) & 0x01) as usize;
        let channels = if bytes[3] >> 6 == 0b11 { 1 } else { 2 };

        let (bitrate_kbps, sample_rate, samples, coefficient) = match version {
            MpegVersion::V1 => (
                BITRATES_V1_L3[bitrate_index],
                [44_100, 48_000, 32_000][sample_rate_index],
                1152,
                144,
            ),
            MpegVersion::V2 => (
                BITRATES_V2_L3[bitrate_index],
                [22_050, 24_000, 16_000][sample_rate_index],
                576,
                72,
            ),
            MpegVersion::V2_5 => (
                BITRATES_V2_L3[bitrate_index],
                [11_025, 12_000, 8_000][sample_rate_index],
                576,
                72,
            ),
        };

        let length = coefficient * bitrate_kbps as usize * 1000 / sample_rate as usize + padding;

        Some(Self {
            format: StreamFormat {
                version,
                sample_rate,
                channels,
            },
            protected,
            length,
            samples,
        })
    }

    /// Offset of the Xing/Info tag inside a frame, after the side information
    fn xing_offset(&self) -> usize {
        let side_info = match (self.format.version, self.format.channels) {
            (MpegVersion::V1, 1) => 17,
            (MpegVersion::V1, _) => 32,
            (_, 1) => 9,
            (_, _) => 17,
        };
        4 + if self.protected { 2 } else { 0 } + side_info
    }
}

/// An MP3 stream reduced to its audio frames
#[derive(Debug, Clone)]
pub struct Mp3Stream {
    pub format: StreamFormat,
    pub frames: Vec<u8>,
    pub frame_count: usize,
    pub total_samples: u64,
}

impl Mp3Stream {
    /// Parse a complete MP3 file. Tags and VBR info frames are dropped; any
    /// bytes that are not part of a whole frame make the stream invalid.
    pub fn parse(bytes: &[u8]) -> Result<Self, String> {
        let body = strip_tags(bytes)?;

        let mut frames = Vec::with_capacity(body.len());
        let mut format: Option<StreamFormat> = None;
        let mut frame_count = 0;
        let mut total_samples = 0u64;
        let mut offset = 0;
        let mut first = true;

        while offset < body.len() {
            let header = FrameHeader::parse(&body[offset..])
                .ok_or_else(|| format!("no frame header at byte {}", offset))?;
            let end = offset + header.length;
            if end > body.len() {
                return Err(format!(
                    "truncated frame at byte {}: needs {} bytes, {} left",
                    offset,
                    header.length,
                    body.len() - offset
                ));
            }
            let frame = &body[offset..end];

            if first && is_info_frame(frame, &header) {
                first = false;
                offset = end;
                continue;
            }
            first = false;

            match format {
                None => format = Some(header.format),
                Some(expected) if expected != header.format => {
                    return Err(format!(
                        "format changes mid-stream at byte {}: {} then {}",
                        offset, expected, header.format
                    ));
                }
                Some(_) => {}
            }

            frames.extend_from_slice(frame);
            frame_count += 1;
            total_samples += u64::from(header.samples);
            offset = end;
        }

        let format = format.ok_or_else(|| "stream contains no audio frames".to_string())?;

        Ok(Self {
            format,
            frames,
            frame_count,
            total_samples,
        })
    }
}

fn strip_tags(bytes: &[u8]) -> Result<&[u8], String> {
    let mut body = bytes;

    if body.len() >= ID3V2_HEADER_LEN && &body[..3] == b"ID3" {
        let size = body[6..10]
            .iter()
            .fold(0usize, |acc, b| (acc << 7) | (*b & 0x7F) as usize);
        let footer = if body[5] & 0x10 != 0 { ID3V2_HEADER_LEN } else { 0 };
        let tag_len = ID3V2_HEADER_LEN + size + footer;
        if tag_len > body.len() {
            return Err("ID3v2 tag is longer than the stream".to_string());
        }
        body = &body[tag_len..];
    }

    if body.len() >= ID3V1_TAG_LEN && &body[body.len() - ID3V1_TAG_LEN..][..3] == b"TAG" {
        body = &body[..body.len() - ID3V1_TAG_LEN];
    }

    Ok(body)
}

fn is_info_frame(frame: &[u8], header: &FrameHeader) -> bool {
    let tag_at = |at: usize| frame.get(at..at + 4);
    let xing = header.xing_offset();
    tag_at(xing) == Some(&b"Xing"[..])
        || tag_at(xing) == Some(&b"Info"[..])
        || tag_at(36) == Some(&b"VBRI"[..])
}
