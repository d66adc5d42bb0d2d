use std::{
    io,
    sync::{Arc, Mutex},
};

use ember_core::{Chunk, OpCode};
use ember_vm::{Vm, VmOptions};
use tracing::Level;

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Captured {
    fn text(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

fn product() -> Chunk {
    let mut chunk = Chunk::new();
    chunk.write_constant(2.0, 1).unwrap();
    chunk.write_constant(3.0, 1).unwrap();
    chunk.write_op(OpCode::Multiply, 2);
    chunk.write_op(OpCode::Return, 2);
    chunk
}

fn run_captured(options: VmOptions) -> String {
    let captured = Captured::default();
    let writer = captured.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(Level::TRACE)
        .with_ansi(false)
        .without_time()
        .with_writer(move || writer.clone())
        .finish();

    let result = tracing::subscriber::with_default(subscriber, || Vm::with_options(options).interpret(&product()));
    assert_eq!(result, Ok(6.0));
    captured.text()
}

#[test]
fn trace_option_emits_one_event_per_instruction() {
    let log = run_captured(VmOptions::default().with_trace(true));

    let rows = log.lines().filter(|l| l.contains("ember_vm::trace")).count();
    assert_eq!(rows, 4, "{log}");
    assert!(log.contains("[ 2 ][ 3 ]"), "{log}");
    assert!(log.contains("000004 06              2  OP_MULTIPLY"), "{log}");
    assert!(log.contains("run finished"), "{log}");
}

#[test]
fn no_trace_events_without_the_option() {
    let log = run_captured(VmOptions::default());

    assert!(!log.contains("ember_vm::trace"), "{log}");
    assert!(log.contains("run start"), "{log}");
}
