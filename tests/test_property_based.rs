//! Property-based tests for request sizing and reply state bounds

mod common;

use common::{ReplyBuilder, ScriptedTransport};
use jessi_core::exc::ExcRoutine;
use jessi_core::ipc::codec::MessageReader;
use jessi_core::ipc::{MachMsgHeader, MACH_NOTIFY_SEND_ONCE};
use jessi_core::kern::THREAD_STATE_MAX;
use jessi_core::{ExcError, ExceptionType, MachExcClient, PortName, ThreadState};
use proptest::prelude::*;

fn exception_type() -> impl Strategy<Value = ExceptionType> {
    proptest::sample::select(ExceptionType::ALL.to_vec())
}

fn codes(max: usize) -> impl Strategy<Value = Vec<i64>> {
    prop::collection::vec(any::<i64>(), 0..=max)
}

// ════════════════════════════════════════════════════════════
// Request Properties
// ════════════════════════════════════════════════════════════

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Raise requests grow by eight bytes per code and carry the codes verbatim
    #[test]
    fn raise_size_tracks_codes(exception in exception_type(), codes in codes(2)) {
        let client = MachExcClient::new(ScriptedTransport::replying(ReplyBuilder::simple(0).build()));
        client
            .raise_exception(PortName(1), PortName(2), PortName(3), exception, &codes)
            .unwrap();

        let sent = &client.transport().sent()[0].bytes;
        prop_assert_eq!(sent.len(), 68 + 8 * codes.len());
        prop_assert_eq!(
            ExcRoutine::Raise.request_layout().size_with(&[codes.len()]),
            Some(sent.len())
        );

        let mut r = MessageReader::new(sent);
        r.seek(60);
        prop_assert_eq!(r.get_i32(), exception.as_raw());
        prop_assert_eq!(r.get_u32() as usize, codes.len());
        for code in &codes {
            prop_assert_eq!(r.get_i64(), *code);
        }
    }

    /// State requests pack both arrays
    #[test]
    fn raise_state_size_tracks_arrays(
        codes in codes(2),
        state in prop::collection::vec(any::<u32>(), 0..=THREAD_STATE_MAX),
    ) {
        let client = MachExcClient::new(ScriptedTransport::replying(
            ReplyBuilder::state(2506, 6, &[]).build(),
        ));
        let mut flavor = 6;
        let mut new_state = ThreadState::new();
        client
            .raise_exception_state(
                PortName(1),
                ExceptionType::Breakpoint,
                &codes,
                &mut flavor,
                &state,
                &mut new_state,
            )
            .unwrap();

        let sent = &client.transport().sent()[0].bytes;
        prop_assert_eq!(sent.len(), 48 + 8 * codes.len() + 4 * state.len());
        let header = MachMsgHeader::decode(&mut MessageReader::new(sent));
        prop_assert_eq!(header.msgh_size as usize, sent.len());
    }

    /// More than two codes never reaches the transport
    #[test]
    fn excess_codes_rejected(codes in prop::collection::vec(any::<i64>(), 3..16)) {
        let client = MachExcClient::new(ScriptedTransport::default());
        let err = client
            .raise_exception(PortName(1), PortName(2), PortName(3), ExceptionType::Crash, &codes)
            .unwrap_err();
        prop_assert!(!err.was_sent());
        prop_assert!(client.transport().sent().is_empty());
        prop_assert!(client.transport().events().is_empty());
    }
}

// ════════════════════════════════════════════════════════════
// Reply Properties
// ════════════════════════════════════════════════════════════

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Any well-formed state reply comes back word for word
    #[test]
    fn state_reply_round_trips(
        flavor in any::<i32>(),
        words in prop::collection::vec(any::<u32>(), 0..=THREAD_STATE_MAX),
    ) {
        let client = MachExcClient::new(ScriptedTransport::replying(
            ReplyBuilder::state(2507, flavor, &words).build(),
        ));
        let mut out_flavor = 0;
        let mut new_state = ThreadState::new();
        client
            .raise_exception_state_identity(
                PortName(1),
                PortName(2),
                PortName(3),
                ExceptionType::Breakpoint,
                &[0],
                &mut out_flavor,
                &[],
                &mut new_state,
            )
            .unwrap();
        prop_assert_eq!(out_flavor, flavor);
        prop_assert_eq!(new_state.as_slice(), &words[..]);
    }

    /// Declared counts past the bound copy exactly the bound
    #[test]
    fn oversized_count_truncates(count in (THREAD_STATE_MAX as u32 + 1)..u32::MAX) {
        let words = vec![0x5a5a_5a5au32; THREAD_STATE_MAX];
        let reply = ReplyBuilder::state(2506, 6, &words).state_count(count).build();
        let client = MachExcClient::new(ScriptedTransport::replying(reply));
        let mut flavor = 6;
        let mut new_state = ThreadState::new();
        let err = client
            .raise_exception_state(
                PortName(1),
                ExceptionType::Breakpoint,
                &[],
                &mut flavor,
                &[],
                &mut new_state,
            )
            .unwrap_err();
        prop_assert_eq!(err, ExcError::ArrayTooLarge { count, max: THREAD_STATE_MAX });
        prop_assert_eq!(new_state.len(), THREAD_STATE_MAX);
    }

    /// Any unexpected id other than the send-once notification is a mismatch
    #[test]
    fn unexpected_id_is_mismatch(id in any::<i32>()) {
        prop_assume!(id != 2505 && id != MACH_NOTIFY_SEND_ONCE);
        let client = MachExcClient::new(ScriptedTransport::replying(
            ReplyBuilder::simple(0).id(id).build(),
        ));
        let err = client
            .raise_exception(PortName(1), PortName(2), PortName(3), ExceptionType::Breakpoint, &[])
            .unwrap_err();
        prop_assert_eq!(err, ExcError::ProtocolMismatch { expected: 2505, actual: id });
    }
}
