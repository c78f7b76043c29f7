//! DTC status decoding and ReadDTCInformation sub-functions, supplemented
//! from `original_source/include/uds_dtc.hpp` (Annex D status bits and the
//! sub-function catalogue) — spec.md's DTC module names only "DTC
//! management" without detailing either.

use bitflags::bitflags;

bitflags! {
    /// The one-byte DTC status mask (ISO 14229-1 Annex D).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StatusMask: u8 {
        const TEST_FAILED                          = 0b0000_0001;
        const TEST_FAILED_THIS_OPERATION_CYCLE      = 0b0000_0010;
        const PENDING_DTC                           = 0b0000_0100;
        const CONFIRMED_DTC                         = 0b0000_1000;
        const TEST_NOT_COMPLETED_SINCE_LAST_CLEAR    = 0b0001_0000;
        const TEST_FAILED_SINCE_LAST_CLEAR           = 0b0010_0000;
        const TEST_NOT_COMPLETED_THIS_OPERATION_CYCLE = 0b0100_0000;
        const WARNING_INDICATOR_REQUESTED            = 0b1000_0000;
    }
}

/// ReadDTCInformation (0x19) sub-functions, from `uds_dtc.hpp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadDtcSubFunction {
    ReportNumberOfDtcByStatusMask,
    ReportDtcByStatusMask,
    ReportDtcSnapshotIdentification,
    ReportDtcSnapshotRecordByDtcNumber,
    ReportDtcSnapshotRecordByRecordNumber,
    ReportDtcExtendedDataRecordByDtcNumber,
    ReportNumberOfDtcBySeverityMaskRecord,
    ReportDtcBySeverityMaskRecord,
    ReportSeverityInformationOfDtc,
    ReportSupportedDtc,
    ReportFirstTestFailedDtc,
    ReportFirstConfirmedDtc,
    ReportMostRecentTestFailedDtc,
    ReportMostRecentConfirmedDtc,
    ReportMirrorMemoryDtcByStatusMask,
    Other(u8),
}

impl ReadDtcSubFunction {
    pub fn to_byte(self) -> u8 {
        use ReadDtcSubFunction::*;
        match self {
            ReportNumberOfDtcByStatusMask => 0x01,
            ReportDtcByStatusMask => 0x02,
            ReportDtcSnapshotIdentification => 0x03,
            ReportDtcSnapshotRecordByDtcNumber => 0x04,
            ReportDtcSnapshotRecordByRecordNumber => 0x05,
            ReportDtcExtendedDataRecordByDtcNumber => 0x06,
            ReportNumberOfDtcBySeverityMaskRecord => 0x07,
            ReportDtcBySeverityMaskRecord => 0x08,
            ReportSeverityInformationOfDtc => 0x09,
            ReportSupportedDtc => 0x0A,
            ReportFirstTestFailedDtc => 0x0B,
            ReportFirstConfirmedDtc => 0x0C,
            ReportMostRecentTestFailedDtc => 0x0D,
            ReportMostRecentConfirmedDtc => 0x0E,
            ReportMirrorMemoryDtcByStatusMask => 0x0F,
            Other(byte) => byte,
        }
    }

    pub fn from_byte(byte: u8) -> Self {
        use ReadDtcSubFunction::*;
        match byte {
            0x01 => ReportNumberOfDtcByStatusMask,
            0x02 => ReportDtcByStatusMask,
            0x03 => ReportDtcSnapshotIdentification,
            0x04 => ReportDtcSnapshotRecordByDtcNumber,
            0x05 => ReportDtcSnapshotRecordByRecordNumber,
            0x06 => ReportDtcExtendedDataRecordByDtcNumber,
            0x07 => ReportNumberOfDtcBySeverityMaskRecord,
            0x08 => ReportDtcBySeverityMaskRecord,
            0x09 => ReportSeverityInformationOfDtc,
            0x0A => ReportSupportedDtc,
            0x0B => ReportFirstTestFailedDtc,
            0x0C => ReportFirstConfirmedDtc,
            0x0D => ReportMostRecentTestFailedDtc,
            0x0E => ReportMostRecentConfirmedDtc,
            0x0F => ReportMirrorMemoryDtcByStatusMask,
            other => Other(other),
        }
    }
}

/// A 24-bit DTC plus its status byte, the record shape most
/// ReadDTCInformation sub-functions return repeated for each code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DtcRecord {
    pub dtc: u32,
    pub status: StatusMask,
}

impl DtcRecord {
    /// Parses a flat `[dtc_hi][dtc_mid][dtc_lo][status]...` buffer into
    /// records, the layout ReportDtcByStatusMask and friends return.
    pub fn parse_list(data: &[u8]) -> Vec<DtcRecord> {
        data.chunks_exact(4)
            .map(|chunk| DtcRecord {
                dtc: ((chunk[0] as u32) << 16) | ((chunk[1] as u32) << 8) | chunk[2] as u32,
                status: StatusMask::from_bits_truncate(chunk[3]),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mask_decodes_multiple_bits() {
        let status = StatusMask::from_bits_truncate(0b1000_1001);
        assert!(status.contains(StatusMask::TEST_FAILED));
        assert!(status.contains(StatusMask::CONFIRMED_DTC));
        assert!(status.contains(StatusMask::WARNING_INDICATOR_REQUESTED));
        assert!(!status.contains(StatusMask::PENDING_DTC));
    }

    #[test]
    fn sub_function_round_trips() {
        for byte in 0x01..=0x0Fu8 {
            assert_eq!(ReadDtcSubFunction::from_byte(byte).to_byte(), byte);
        }
    }

    #[test]
    fn parses_dtc_list() {
        let data = [0x01, 0x02, 0x03, 0x09, 0x04, 0x05, 0x06, 0x08];
        let records = DtcRecord::parse_list(&data);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].dtc, 0x010203);
        assert!(records[0].status.contains(StatusMask::TEST_FAILED));
        assert_eq!(records[1].dtc, 0x040506);
    }
}
