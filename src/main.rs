use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use tioga::core::backend::{Backend, BackendConfig};
use tioga::core::buffer::PresentBuffer;
use tioga::core::events::{
    BackendEvent, HostEvent, HostEventKind, TouchAction, TouchPoint, TouchSample,
};
use tioga::core::output::OutputState;
use tioga::host::api::{HostConnection, StubHostConnection};
use tioga::tlog;
use tioga::util::logging;

fn main() -> Result<()> {
    // Initialize logging
    // Set default log level to info
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info,tioga=debug");
    }
    // Initialize logging with standardized format
    tracing_subscriber::fmt()
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::new(
            "%Y-%m-%d %H:%M:%S".to_string(),
        ))
        .with_ansi(false)
        .init();

    // Loopback host stand-in (real frontends hand over a live connection)
    let stub = StubHostConnection::new();
    let conn: Arc<dyn HostConnection> = stub.clone();

    let mut backend = Backend::new(conn, BackendConfig::default())?;
    let output = backend.add_output()?;
    backend.start()?;

    let surface = backend
        .output(output)
        .expect("output was just added")
        .host_surface();
    let mode = backend.output(output).expect("output was just added").mode();

    // Scripted host session: the surface comes up and enters the foreground
    stub.push_event(HostEvent {
        surface,
        kind: HostEventKind::Created,
    });
    stub.push_event(HostEvent {
        surface,
        kind: HostEventKind::Resumed,
    });

    // let the loop thread bring the output to the foreground
    while !backend.output(output).is_some_and(|o| o.is_foreground()) {
        backend.dispatch_pending();
        std::thread::sleep(Duration::from_millis(1));
    }

    // two rendered frames enter the presentation pipeline
    for id in 1..=2u64 {
        let mut state = OutputState::new();
        state.set_buffer(PresentBuffer::new(id, mode.width, mode.height));
        backend
            .output_mut(output)
            .expect("output was just added")
            .commit(&state)?;
    }

    // the user taps the screen, then the session ends
    let tap = |action| HostEvent {
        surface,
        kind: HostEventKind::Touch(TouchSample {
            action,
            points: vec![TouchPoint {
                id: 1,
                x: 540.0,
                y: 1200.0,
            }],
            changed: 0,
        }),
    };
    stub.push_event(tap(TouchAction::Down));
    stub.push_event(tap(TouchAction::Up));
    stub.close();

    tlog!(logging::MAIN, "backend running on stub host session");

    loop {
        backend.dispatch_pending();
        backend.process_all_completions();

        let mut lost = false;
        for event in backend.take_events() {
            tlog!(logging::MAIN, "event: {:?}", event);
            if matches!(event, BackendEvent::ConnectionLost) {
                lost = true;
            }
        }
        if lost {
            break;
        }
        std::thread::sleep(Duration::from_millis(10));
    }

    tlog!(
        logging::MAIN,
        "host session ended after {} presents, shutting down",
        stub.present_count()
    );
    backend.destroy();
    Ok(())
}
