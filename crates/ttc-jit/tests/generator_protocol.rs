#![cfg(unix)]

mod support;

use std::time::{Duration, Instant};

use support::FakeGenerator;
use ttc_jit::{Arch, Compiler, Handler, OptionValue, TransposeParam, TtcError};

fn request() -> TransposeParam {
    TransposeParam::new(&[0, 2, 1], &[16, 8, 4])
}

#[test]
fn failing_generator_is_an_external_process_failure() {
    let generator = FakeGenerator::new("exit-code", "echo 'bad blocking' >&2\nexit 3");
    let handler = Handler::with_config(generator.config());
    let err = handler.create_or_reuse_plan(&request()).expect_err("generator fails");
    match &err {
        TtcError::ExternalProcessFailure(message) => {
            assert!(message.contains("bad blocking"), "{message}")
        }
        other => panic!("unexpected error {other}"),
    }
    assert_eq!(handler.plan_count(), 0);
    assert_eq!(generator.invocations(), ["--size=16,8,4 --perm=0,2,1"]);
}

#[test]
fn failure_is_not_cached() {
    let generator = FakeGenerator::new("retry", "exit 1");
    let handler = Handler::with_config(generator.config());
    for _ in 0..2 {
        assert!(handler.create_or_reuse_plan(&request()).is_err());
    }
    assert_eq!(generator.invocations().len(), 2);
    assert_eq!(handler.plan_count(), 0);
}

#[test]
fn missing_hand_off_line_is_a_protocol_violation() {
    let generator = FakeGenerator::printing("silent", "[ttc] nothing to report");
    let handler = Handler::with_config(generator.config());
    let err = handler.create_or_reuse_plan(&request()).expect_err("no header");
    assert!(matches!(err, TtcError::ProtocolViolation(_)), "{err}");
}

#[test]
fn non_identifier_header_is_a_protocol_violation() {
    let generator = FakeGenerator::printing("bad-name", "#include \"../escape.h\"");
    let handler = Handler::with_config(generator.config());
    let err = handler.create_or_reuse_plan(&request()).expect_err("bad header");
    assert!(matches!(err, TtcError::ProtocolViolation(_)), "{err}");
}

#[test]
fn unbuildable_header_fails_in_the_build_step() {
    let generator = FakeGenerator::printing("no-kernel", "#include \"ghost_kernel.h\"");
    let mut config = generator.config();
    config.build_timeout = Some(Duration::from_secs(60));
    let handler = Handler::with_config(config);
    handler.set_option(OptionValue::Compiler(Compiler::Gxx));
    let err = handler.create_or_reuse_plan(&request()).expect_err("header missing");
    assert!(matches!(err, TtcError::ExternalProcessFailure(_)), "{err}");
    assert!(generator.work_dir().join("ghost_kernel.cpp").exists());
}

#[test]
fn unreachable_generator_is_an_external_process_failure() {
    let generator = FakeGenerator::new("unused", "exit 0");
    let config = generator.config().with_generator("/nonexistent/ttc");
    let handler = Handler::with_config(config);
    let err = handler.create_or_reuse_plan(&request()).expect_err("cannot spawn");
    assert!(matches!(err, TtcError::ExternalProcessFailure(_)), "{err}");
}

#[test]
fn slow_generator_is_killed_after_the_timeout() {
    let generator = FakeGenerator::new("slow", "exec sleep 10");
    let mut config = generator.config();
    config.generator_timeout = Some(Duration::from_millis(200));
    let handler = Handler::with_config(config);
    let started = Instant::now();
    let err = handler.create_or_reuse_plan(&request()).expect_err("timeout");
    assert!(matches!(err, TtcError::ExternalProcessFailure(_)), "{err}");
    assert!(started.elapsed() < Duration::from_secs(8));
}

#[test]
fn unsupported_targets_never_spawn_the_generator() {
    let generator = FakeGenerator::new("rejections", "exit 0");
    let cases = [
        OptionValue::Compiler(Compiler::Ibm),
        OptionValue::Arch(Arch::Power),
        OptionValue::Arch(Arch::Cuda),
    ];
    for option in cases {
        let handler = Handler::with_config(generator.config());
        handler.set_option(option.clone());
        let err = handler.create_or_reuse_plan(&request()).expect_err("rejected");
        assert!(matches!(err, TtcError::UnsupportedConfiguration(_)), "{option:?}: {err}");
    }
    assert!(generator.invocations().is_empty());
}

#[test]
fn options_reach_the_generator_command_line() {
    let generator = FakeGenerator::new("flags", "exit 2");
    let handler = Handler::with_config(generator.config());
    handler.set_option(OptionValue::NumThreads(4));
    handler.set_option(OptionValue::Arch(Arch::Avx));
    let param = request().with_beta(0.5).with_loop_perm(&[2, 1, 0]);
    assert!(handler.create_or_reuse_plan(&param).is_err());
    assert_eq!(
        generator.invocations(),
        ["--numThreads=4 --architecture=avx --size=16,8,4 --perm=0,2,1 --loopPerm=2,1,0 --beta=0.500000"]
    );
}
