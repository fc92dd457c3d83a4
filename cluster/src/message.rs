//! Framing data for job payloads handed to engines.

use std::io::{Read, Write};

use byteorder::{NetworkEndian, ReadBytesExt, WriteBytesExt};

use crate::job::JobError;

/// Framing data for each payload transmission, indicating the job the
/// payload belongs to and the payload length in bytes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct JobHeader {
    /// Pool-unique job identifier.
    pub job: u64,
    /// Number of payload bytes following the header.
    pub length: u32,
}

impl JobHeader {
    /// Number of bytes in an encoded header.
    pub const LENGTH: usize = 12;

    /// Writes the header as binary data.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_u64::<NetworkEndian>(self.job)?;
        writer.write_u32::<NetworkEndian>(self.length)
    }

    /// Reads a header back from binary data.
    pub fn read_from<R: Read>(reader: &mut R) -> std::io::Result<JobHeader> {
        let job = reader.read_u64::<NetworkEndian>()?;
        let length = reader.read_u32::<NetworkEndian>()?;
        Ok(JobHeader { job, length })
    }

    /// The number of bytes required for the header and payload.
    pub fn required_bytes(&self) -> usize {
        Self::LENGTH + self.length as usize
    }

    /// Prepends a header to `payload`, producing the frame an engine receives.
    pub fn frame(job: u64, payload: &[u8]) -> Vec<u8> {
        let header = JobHeader { job, length: payload.len() as u32 };
        let mut bytes = Vec::with_capacity(header.required_bytes());
        header.write_to(&mut bytes).expect("writing to a Vec cannot fail");
        bytes.extend_from_slice(payload);
        bytes
    }

    /// Splits a frame into its header and payload, validating the length.
    pub fn unframe(bytes: &[u8]) -> Result<(JobHeader, &[u8]), JobError> {
        let mut reader = bytes;
        let header = JobHeader::read_from(&mut reader)
            .map_err(|e| JobError::BadFrame(e.to_string()))?;
        if reader.len() != header.length as usize {
            return Err(JobError::BadFrame(format!(
                "header announces {} payload bytes, frame carries {}",
                header.length,
                reader.len(),
            )));
        }
        Ok((header, reader))
    }
}

#[cfg(test)]
mod tests {
    use super::JobHeader;
    use crate::job::JobError;

    #[test]
    fn header_roundtrip() {
        let frame = JobHeader::frame(42, b"payload");
        assert_eq!(frame.len(), JobHeader::LENGTH + 7);
        let (header, payload) = JobHeader::unframe(&frame).unwrap();
        assert_eq!(header, JobHeader { job: 42, length: 7 });
        assert_eq!(payload, b"payload");
    }

    #[test]
    fn truncated_frame_is_rejected() {
        let mut frame = JobHeader::frame(7, b"0123456789");
        frame.truncate(frame.len() - 3);
        assert!(matches!(JobHeader::unframe(&frame), Err(JobError::BadFrame(_))));
    }
}
