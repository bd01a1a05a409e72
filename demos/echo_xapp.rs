// Echo xApp: answers every ECHO_REQ with the same payload as ECHO_RESP.
//
// A client session in the same region sends a few requests, prints the
// answers and halts the xApp. Ctrl-C halts it too.
//
//   XAPP_WORKERS=4 XAPP_LOG=debug cargo run --example echo_xapp

use std::sync::Arc;
use std::thread;
use std::time::Duration;
use xapp_frame::Core::alloc::SharedMemoryAllocator;
use xapp_frame::Messaging::{CallbackInfo, Message, Messenger, StopHandle};
use xapp_frame::Transport::Transport;
use xapp_frame::{RingTransport, XappBuilder, XappConfig};

const ECHO_REQ: i32 = 1000;
const ECHO_RESP: i32 = 1001;

fn echo(msg: &mut Message, info: CallbackInfo) {
    let Some(body) = msg.copy_payload() else { return };
    tracing::debug!(sub_id = info.sub_id, len = info.len, "echoing");
    if let Err(e) = msg.send_response(Some(ECHO_RESP), None, None, Some(&body)) {
        tracing::warn!(error = %e, "echo not sent");
    }
}

struct HaltOnExit(StopHandle);

impl Drop for HaltOnExit {
    fn drop(&mut self) {
        self.0.stop();
    }
}

fn exchange(client: &Messenger) -> xapp_frame::Result<()> {
    for i in 0..5 {
        let mut msg = client.alloc_msg(256)?;
        let text = format!("hello #{i}");
        msg.send_msg(Some(ECHO_REQ), None, None, Some(text.as_bytes()))?;

        match client.receive(Duration::from_secs(2))? {
            Some(reply) => println!(
                "reply type={} payload={:?}",
                reply.mtype().unwrap_or_default(),
                String::from_utf8_lossy(reply.payload())
            ),
            None => println!("no reply to {text:?}"),
        }
    }
    Ok(())
}

fn main() -> xapp_frame::Result<()> {
    let config = XappConfig::from_env()?;
    xapp_frame::logging::init(config.log_filter.as_deref());

    let region = Arc::new(SharedMemoryAllocator::new(config.region_size, None)?);
    let server = RingTransport::builder()
        .with_ring_capacity(config.ring_capacity)
        .open_on(Arc::clone(&region))?;
    let server_endpoint = server.endpoint();
    server.routes().mark_ready();

    let mut xapp = XappBuilder::new()
        .with_config(config)
        .with_transport(Arc::new(server))
        .build()?;
    xapp.add_handler(ECHO_REQ, echo);
    xapp.halt_on_interrupt()?;

    let client = RingTransport::builder().open_on(region)?;
    client.routes().add(ECHO_REQ, server_endpoint);
    let client: Arc<dyn Transport> = Arc::new(client);
    let stop = xapp.stop_handle();

    let client_thread = thread::spawn(move || {
        // halts the xApp however the client ends, error and panic included
        let _halt = HaltOnExit(stop);
        exchange(&Messenger::new(client, true))
    });

    xapp.run_configured()?;
    client_thread
        .join()
        .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
}
