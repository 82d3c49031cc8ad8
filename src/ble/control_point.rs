//! FTMS Control Point (0x2AD9) request handling.
//!
//! Clients write an opcode plus parameters; the machine indicates back a
//! three-byte tuple `[0x80, opcode, result]` optionally followed by
//! response parameters. Only control-request and reset are meaningful for
//! a rower with no adjustable resistance; everything else is answered
//! opcode-not-supported.

/// Prefix of every control point response.
pub const RESPONSE_CODE: u8 = 0x80;

/// Opcodes this machine recognises.
pub mod opcode {
    pub const REQUEST_CONTROL: u8 = 0x00;
    pub const RESET: u8 = 0x01;
}

/// Result codes defined by the FTMS spec.
pub mod result {
    pub const SUCCESS: u8 = 0x01;
    pub const OPCODE_NOT_SUPPORTED: u8 = 0x02;
    pub const INVALID_PARAMETER: u8 = 0x03;
    pub const OPERATION_FAILED: u8 = 0x04;
    pub const CONTROL_NOT_PERMITTED: u8 = 0x05;
}

/// Handle one control point write. `on_reset` runs when the reset opcode
/// arrives. Returns the indication payload, or `None` for an empty write
/// (nothing to respond to).
pub fn handle_request(request: &[u8], mut on_reset: impl FnMut()) -> Option<Vec<u8>> {
    let (&op, _params) = request.split_first()?;

    let result = match op {
        opcode::REQUEST_CONTROL => result::SUCCESS,
        opcode::RESET => {
            on_reset();
            result::SUCCESS
        }
        _ => {
            tracing::debug!(opcode = format!("{op:#04x}"), "unsupported control point opcode");
            result::OPCODE_NOT_SUPPORTED
        }
    };

    Some(vec![RESPONSE_CODE, op, result])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_control_succeeds() {
        let mut reset_count = 0;
        let response = handle_request(&[opcode::REQUEST_CONTROL], || reset_count += 1).unwrap();
        assert_eq!(response, vec![0x80, 0x00, result::SUCCESS]);
        assert_eq!(reset_count, 0);
    }

    #[test]
    fn test_reset_invokes_callback() {
        let mut reset_count = 0;
        let response = handle_request(&[opcode::RESET], || reset_count += 1).unwrap();
        assert_eq!(response, vec![0x80, 0x01, result::SUCCESS]);
        assert_eq!(reset_count, 1);
    }

    #[test]
    fn test_unknown_opcodes_are_rejected() {
        // Target power and indoor-bike simulation are bike concepts
        for op in [0x05u8, 0x11, 0x7F] {
            let response = handle_request(&[op, 0xAA, 0xBB], || {}).unwrap();
            assert_eq!(response, vec![0x80, op, result::OPCODE_NOT_SUPPORTED]);
        }
    }

    #[test]
    fn test_empty_write_gets_no_response() {
        assert!(handle_request(&[], || {}).is_none());
    }
}
