//! Negative Response Codes (ISO 14229-1 Annex A): the third byte of a
//! `[0x7F][request SID][NRC]` reply.

use std::fmt;

/// A negative response code. `Known` covers the codes this crate interprets
/// directly (retry logic, session gating); `Other` preserves any byte the
/// server sends that isn't one of those, so callers still see the raw value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegativeResponseCode {
    GeneralReject,
    ServiceNotSupported,
    SubFunctionNotSupported,
    IncorrectMessageLengthOrInvalidFormat,
    BusyRepeatRequest,
    ConditionsNotCorrect,
    RequestSequenceError,
    RequestOutOfRange,
    SecurityAccessDenied,
    InvalidKey,
    ExceededNumberOfAttempts,
    RequiredTimeDelayNotExpired,
    UploadDownloadNotAccepted,
    TransferDataSuspended,
    GeneralProgrammingFailure,
    WrongBlockSequenceCounter,
    RequestCorrectlyReceivedResponsePending,
    SubFunctionNotSupportedInActiveSession,
    ServiceNotSupportedInActiveSession,
    /// Any NRC byte not covered above, manufacturer-specific or otherwise.
    Other(u8),
}

impl NegativeResponseCode {
    /// Maps a raw NRC byte from the wire to its typed form.
    pub fn from_byte(byte: u8) -> Self {
        use NegativeResponseCode::*;
        match byte {
            0x10 => GeneralReject,
            0x11 => ServiceNotSupported,
            0x12 => SubFunctionNotSupported,
            0x13 => IncorrectMessageLengthOrInvalidFormat,
            0x21 => BusyRepeatRequest,
            0x22 => ConditionsNotCorrect,
            0x24 => RequestSequenceError,
            0x31 => RequestOutOfRange,
            0x33 => SecurityAccessDenied,
            0x35 => InvalidKey,
            0x36 => ExceededNumberOfAttempts,
            0x37 => RequiredTimeDelayNotExpired,
            0x70 => UploadDownloadNotAccepted,
            0x71 => TransferDataSuspended,
            0x72 => GeneralProgrammingFailure,
            0x73 => WrongBlockSequenceCounter,
            0x78 => RequestCorrectlyReceivedResponsePending,
            0x7E => SubFunctionNotSupportedInActiveSession,
            0x7F => ServiceNotSupportedInActiveSession,
            other => Other(other),
        }
    }

    /// The raw byte this code represents, for re-encoding or logging.
    pub fn to_byte(self) -> u8 {
        use NegativeResponseCode::*;
        match self {
            GeneralReject => 0x10,
            ServiceNotSupported => 0x11,
            SubFunctionNotSupported => 0x12,
            IncorrectMessageLengthOrInvalidFormat => 0x13,
            BusyRepeatRequest => 0x21,
            ConditionsNotCorrect => 0x22,
            RequestSequenceError => 0x24,
            RequestOutOfRange => 0x31,
            SecurityAccessDenied => 0x33,
            InvalidKey => 0x35,
            ExceededNumberOfAttempts => 0x36,
            RequiredTimeDelayNotExpired => 0x37,
            UploadDownloadNotAccepted => 0x70,
            TransferDataSuspended => 0x71,
            GeneralProgrammingFailure => 0x72,
            WrongBlockSequenceCounter => 0x73,
            RequestCorrectlyReceivedResponsePending => 0x78,
            SubFunctionNotSupportedInActiveSession => 0x7E,
            ServiceNotSupportedInActiveSession => 0x7F,
            Other(byte) => byte,
        }
    }

    /// `true` for 0x78, the "still working" code the client retries on
    /// forever rather than surfacing as a failure.
    pub fn is_response_pending(self) -> bool {
        matches!(self, NegativeResponseCode::RequestCorrectlyReceivedResponsePending)
    }

    /// `true` for 0x21, the code that earns exactly one extra receive.
    pub fn is_busy_repeat(self) -> bool {
        matches!(self, NegativeResponseCode::BusyRepeatRequest)
    }

    /// `true` for 0x73, the code a block-transfer retries by resending the
    /// chunk at the server's echoed counter rather than aborting.
    pub fn is_wrong_block_sequence_counter(self) -> bool {
        matches!(self, NegativeResponseCode::WrongBlockSequenceCounter)
    }
}

impl fmt::Display for NegativeResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use NegativeResponseCode::*;
        let name = match self {
            GeneralReject => "generalReject",
            ServiceNotSupported => "serviceNotSupported",
            SubFunctionNotSupported => "subFunctionNotSupported",
            IncorrectMessageLengthOrInvalidFormat => "incorrectMessageLengthOrInvalidFormat",
            BusyRepeatRequest => "busyRepeatRequest",
            ConditionsNotCorrect => "conditionsNotCorrect",
            RequestSequenceError => "requestSequenceError",
            RequestOutOfRange => "requestOutOfRange",
            SecurityAccessDenied => "securityAccessDenied",
            InvalidKey => "invalidKey",
            ExceededNumberOfAttempts => "exceededNumberOfAttempts",
            RequiredTimeDelayNotExpired => "requiredTimeDelayNotExpired",
            UploadDownloadNotAccepted => "uploadDownloadNotAccepted",
            TransferDataSuspended => "transferDataSuspended",
            GeneralProgrammingFailure => "generalProgrammingFailure",
            WrongBlockSequenceCounter => "wrongBlockSequenceCounter",
            RequestCorrectlyReceivedResponsePending => "requestCorrectlyReceivedResponsePending",
            SubFunctionNotSupportedInActiveSession => "subFunctionNotSupportedInActiveSession",
            ServiceNotSupportedInActiveSession => "serviceNotSupportedInActiveSession",
            Other(byte) => return write!(f, "nrc 0x{:02X}", byte),
        };
        write!(f, "{} (0x{:02X})", name, self.to_byte())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_known_codes() {
        for byte in [
            0x10, 0x11, 0x12, 0x13, 0x21, 0x22, 0x24, 0x31, 0x33, 0x35, 0x36, 0x37, 0x70, 0x71,
            0x72, 0x73, 0x78, 0x7E, 0x7F,
        ] {
            assert_eq!(NegativeResponseCode::from_byte(byte).to_byte(), byte);
        }
    }

    #[test]
    fn unknown_byte_preserved() {
        let nrc = NegativeResponseCode::from_byte(0x99);
        assert_eq!(nrc.to_byte(), 0x99);
        assert_eq!(format!("{}", nrc), "nrc 0x99");
    }
}
