//! Phase controller tests
//!
//! Covers strict phase ordering, the single wakeup broadcast, CPU discovery
//! with and without stragglers, and cores beyond the array capacity.

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use serial_test::serial;

    use super::super::{context, fast_config, square, wait_result, THREAD_TIMEOUT};
    use crate::log_capture;
    use crate::mock::platform::{AP_TOPOLOGY_BASE, BOOTSTRAP_TOPOLOGY_ID};
    use crate::mock::MockPlatform;
    use crate::mp::{MpConfig, MpError, MpPhase, MpPlatform, TaskState, MAX_CPUS};

    #[test]
    #[serial]
    fn test_phase_requests_out_of_order_are_rejected() {
        let ctx = context(MockPlatform::builder(2).build(), fast_config());
        let mut mp = ctx.controller().unwrap();

        for target in [MpPhase::Null, MpPhase::Run, MpPhase::Done] {
            assert_eq!(
                mp.advance(target),
                Err(MpError::Sequence {
                    current: MpPhase::Null,
                    requested: target
                })
            );
            assert_eq!(mp.phase(), MpPhase::Null);
        }
        // Nothing was signalled by the rejected requests
        assert_eq!(ctx.platform().init_signals(), 0);

        mp.advance(MpPhase::Wakeup).unwrap();
        assert_eq!(
            mp.advance(MpPhase::Wakeup),
            Err(MpError::Sequence {
                current: MpPhase::Wakeup,
                requested: MpPhase::Wakeup
            })
        );
        assert!(mp.advance(MpPhase::Done).is_err());
        assert_eq!(ctx.phase(), MpPhase::Wakeup);

        mp.advance(MpPhase::Run).unwrap();
        assert!(mp.advance(MpPhase::Wakeup).is_err());
        mp.advance(MpPhase::Done).unwrap();

        for target in [MpPhase::Null, MpPhase::Wakeup, MpPhase::Run, MpPhase::Done] {
            assert!(mp.advance(target).is_err());
        }
        assert_eq!(mp.phase(), MpPhase::Done);
        assert_eq!(ctx.phase(), MpPhase::Done);
    }

    #[test]
    #[serial]
    fn test_controller_is_claimed_once() {
        let ctx = context(MockPlatform::builder(1).build(), fast_config());
        let _mp = ctx.controller().unwrap();
        assert!(matches!(ctx.controller(), Err(MpError::AlreadyClaimed)));
    }

    #[test]
    #[serial]
    fn test_wakeup_broadcasts_once_with_parameters() {
        let ctx = context(MockPlatform::builder(3).build(), fast_config());
        let mut mp = ctx.controller().unwrap();
        mp.advance(MpPhase::Wakeup).unwrap();

        let platform = ctx.platform();
        assert_eq!(platform.init_signals(), 1);
        // STARTUP is sent twice; the second one is ignored by running cores
        assert_eq!(platform.startup_signals(), 2);

        let params = platform.wake_params().expect("wake vector installed");
        assert_eq!(params.context, ctx.address());
        assert_ne!(params.exchange, 0);
        assert_eq!(params.tables, platform.descriptor_tables());
        assert_eq!(params.stacks.count, MAX_CPUS);
        assert_eq!(mp.stacks(), Some(params.stacks));
        for index in 0..MAX_CPUS {
            let top = params.stacks.stack_top(index).unwrap();
            assert_eq!(top % 16, 0);
        }

        // Bootstrap core registers itself during wakeup
        let records = mp.cpu_info();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].index, 0);
        assert_eq!(records[0].topology_id, BOOTSTRAP_TOPOLOGY_ID);
        assert!(records[0].is_bootstrap());

        mp.advance(MpPhase::Run).unwrap();
        mp.advance(MpPhase::Done).unwrap();
        assert_eq!(platform.init_signals(), 1);
        assert!(platform.wait_halted(2, THREAD_TIMEOUT));
    }

    #[test]
    #[serial]
    fn test_wake_vector_failure_leaves_phase_unchanged() {
        let platform = MockPlatform::builder(4)
            .fail_wake_vector("no free page below 1 MiB")
            .build();
        let ctx = context(platform, fast_config());
        let mut mp = ctx.controller().unwrap();

        assert_eq!(
            mp.advance(MpPhase::Wakeup),
            Err(MpError::WakeVector("no free page below 1 MiB"))
        );
        assert_eq!(mp.phase(), MpPhase::Null);
        assert_eq!(ctx.platform().init_signals(), 0);
        assert_eq!(ctx.platform().startup_signals(), 0);
        assert!(mp.advance(MpPhase::Run).is_err());
    }

    #[test]
    #[serial]
    fn test_four_cores_discovered_and_square_dispatched() {
        let config = MpConfig::new().with_secure_rebase(false);
        let ctx = context(MockPlatform::builder(4).build(), config);
        let mut mp = ctx.controller().unwrap();

        mp.advance(MpPhase::Wakeup).unwrap();
        mp.advance(MpPhase::Run).unwrap();

        assert_eq!(mp.cpu_count(), 4);
        assert_eq!(ctx.cpu_count(), 4);
        assert_eq!(ctx.ready_count(), 3);

        let records = mp.cpu_info();
        assert_eq!(records.len(), 4);
        let indices: Vec<usize> = records.iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);

        let ids: HashSet<u32> = records.iter().map(|r| r.topology_id).collect();
        assert_eq!(ids.len(), 4, "topology ids must be distinct: {:?}", records);
        assert_eq!(records[0].topology_id, BOOTSTRAP_TOPOLOGY_ID);
        for record in &records[1..] {
            assert!(record.topology_id > AP_TOPOLOGY_BASE);
            assert!(!record.rebased);
        }

        mp.run_task(2, square, 7).unwrap();
        assert_eq!(wait_result(&mp, 2), Ok(49));
        assert_eq!(mp.task_state(2), Ok(TaskState::Ready));

        mp.advance(MpPhase::Done).unwrap();
        assert!(ctx.platform().wait_halted(3, THREAD_TIMEOUT));
    }

    #[test]
    #[serial]
    fn test_bringup_timeout_freezes_partial_count() {
        log_capture::clear();
        let platform = MockPlatform::builder(5).responsive(2).build();
        let ctx = context(platform, fast_config());
        let mut mp = ctx.controller().unwrap();

        mp.advance(MpPhase::Wakeup).unwrap();
        mp.advance(MpPhase::Run).unwrap();

        assert_eq!(mp.cpu_count(), 3);
        assert_eq!(mp.cpu_info().len(), 3);
        assert_eq!(mp.task_slots().len(), 2);
        assert!(log_capture::contains("WARN", "Bring-up timeout"));
        assert_eq!(mp.run_task(3, square, 1), Err(MpError::InvalidIndex(3)));

        mp.advance(MpPhase::Done).unwrap();
        assert!(ctx.platform().wait_halted(2, THREAD_TIMEOUT));
    }

    #[test]
    #[serial]
    fn test_single_core_platform_has_no_workers() {
        let ctx = context(MockPlatform::builder(1).build(), fast_config());
        let mut mp = ctx.controller().unwrap();

        mp.advance(MpPhase::Wakeup).unwrap();
        mp.advance(MpPhase::Run).unwrap();

        assert_eq!(mp.cpu_count(), 1);
        assert!(mp.task_slots().is_empty());
        assert_eq!(mp.run_task(1, square, 3), Err(MpError::InvalidIndex(1)));
        mp.advance(MpPhase::Done).unwrap();
    }

    #[test]
    #[serial]
    fn test_cores_beyond_capacity_are_halted() {
        log_capture::clear();
        // 20 present, 19 respond; only MAX_CPUS fit the arrays
        let platform = MockPlatform::builder(20).build();
        let ctx = context(platform, MpConfig::new().with_secure_rebase(false));
        let mut mp = ctx.controller().unwrap();

        mp.advance(MpPhase::Wakeup).unwrap();
        mp.advance(MpPhase::Run).unwrap();

        assert_eq!(mp.cpu_count(), MAX_CPUS);
        assert_eq!(mp.cpu_info().len(), MAX_CPUS);
        assert!(log_capture::contains("WARN", "Limiting CPU count"));

        // Every index in range belongs to a distinct, registered core
        let ids: HashSet<u32> = mp.cpu_info().iter().map(|r| r.topology_id).collect();
        assert_eq!(ids.len(), MAX_CPUS);

        // Arrivals past capacity stop right after checking in
        let excess = 19 - (MAX_CPUS - 1);
        assert!(ctx.platform().wait_halted(excess, THREAD_TIMEOUT));

        mp.run_task(MAX_CPUS - 1, square, 12).unwrap();
        assert_eq!(wait_result(&mp, MAX_CPUS - 1), Ok(144));

        mp.advance(MpPhase::Done).unwrap();
        assert!(ctx.platform().wait_halted(19, THREAD_TIMEOUT));
    }

    #[test]
    #[serial]
    fn test_current_cpu_index_on_bootstrap() {
        let ctx = context(MockPlatform::builder(2).build(), fast_config());
        assert_eq!(ctx.current_cpu_index(), None);

        let mut mp = ctx.controller().unwrap();
        mp.advance(MpPhase::Wakeup).unwrap();
        assert_eq!(ctx.current_cpu_index(), Some(0));

        mp.advance(MpPhase::Run).unwrap();
        mp.dump();
        mp.advance(MpPhase::Done).unwrap();
        assert!(ctx.platform().wait_halted(1, THREAD_TIMEOUT));
    }
}
