use crossbeam_utils::CachePadded;
use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use xapp_frame::Transport::Buffer::layout::ChannelEntry;
use xapp_frame::Transport::Buffer::{EnqueueError, RingBuffer, MSG_INLINE};
use xapp_frame::Transport::Structs::MessageMeta;

fn create_dummy_channel_entry(capacity: u64) -> Box<ChannelEntry> {
    Box::new(ChannelEntry {
        channel_id: 0,
        flags: AtomicU32::new(0),
        capacity,
        band_offset: 0,
        signal: AtomicU32::new(0),
        tail: CachePadded::new(AtomicU64::new(0)),
        head: CachePadded::new(AtomicU64::new(0)),
    })
}

/// Heap backing for a ring; freed on drop.
struct Backing {
    ptr: *mut u8,
    layout: Layout,
}

impl Backing {
    fn new(capacity: usize) -> Self {
        let size = capacity * RingBuffer::slot_stride();
        let layout = Layout::from_size_align(size, 128).unwrap();
        let ptr = unsafe { alloc_zeroed(layout) };
        assert!(!ptr.is_null(), "Failed to allocate aligned memory");
        Self { ptr, layout }
    }
}

impl Drop for Backing {
    fn drop(&mut self) {
        unsafe { dealloc(self.ptr, self.layout) };
    }
}

fn ring(entry: &ChannelEntry, backing: &Backing) -> RingBuffer {
    let rb = unsafe { RingBuffer::new(entry, backing.ptr) };
    unsafe { rb.init_slots() };
    rb
}

fn meta(mtype: i32) -> MessageMeta {
    MessageMeta {
        mtype,
        ..MessageMeta::default()
    }
}

#[test]
fn simple_enqueue_dequeue() {
    let entry = create_dummy_channel_entry(16);
    let backing = Backing::new(16);
    let rb = ring(&entry, &backing);

    let payload = vec![1, 2, 3, 4];
    assert!(rb.enqueue(&meta(12), &payload).is_ok());

    let (meta_out, data) = rb.dequeue().unwrap();
    assert_eq!(data, payload);
    assert_eq!(meta_out.mtype, 12);
    assert_eq!(meta_out.payload_len, 4);
    assert!(rb.dequeue().is_none());
}

#[test]
fn full_buffer() {
    let entry = create_dummy_channel_entry(4);
    let backing = Backing::new(4);
    let rb = ring(&entry, &backing);
    let payload = vec![0u8; 8];

    for _ in 0..4 {
        assert!(rb.enqueue(&meta(0), &payload).is_ok());
    }
    assert_eq!(rb.enqueue(&meta(0), &payload), Err(EnqueueError::Full));

    assert!(rb.dequeue().is_some());
    assert!(rb.enqueue(&meta(0), &payload).is_ok());
}

#[test]
fn oversize_payload_is_refused() {
    let entry = create_dummy_channel_entry(4);
    let backing = Backing::new(4);
    let rb = ring(&entry, &backing);

    let big = vec![7u8; MSG_INLINE + 1];
    assert_eq!(rb.enqueue(&meta(0), &big), Err(EnqueueError::TooLarge));

    let exact = vec![7u8; MSG_INLINE];
    assert!(rb.enqueue(&meta(0), &exact).is_ok());
    let read = rb.dequeue_with(|_, payload| payload.len()).unwrap();
    assert_eq!(read, MSG_INLINE);
}

#[test]
fn small_mpmc_correctness() {
    let entry = create_dummy_channel_entry(8);
    let backing = Backing::new(8);
    let rb = ring(&entry, &backing);

    thread::scope(|s| {
        s.spawn(|| {
            for i in 0..100u8 {
                while rb.enqueue(&meta(i32::from(i)), &[i]).is_err() {
                    std::hint::spin_loop();
                }
            }
        });

        s.spawn(|| {
            let mut count = 0u8;
            while count < 100 {
                if let Some((m, data)) = rb.dequeue() {
                    assert_eq!(data[0], count);
                    assert_eq!(m.mtype, i32::from(count));
                    count += 1;
                } else {
                    std::hint::spin_loop();
                }
            }
        });
    });
}

#[test]
fn mpmc_correctness_many_threads() {
    let capacity = 64;
    let entry = create_dummy_channel_entry(capacity as u64);
    let backing = Backing::new(capacity);
    let rb = ring(&entry, &backing);

    let producers = 4;
    let consumers = 4;
    let msgs_per_producer = 1000;
    let total = producers * msgs_per_producer;
    let received = Arc::new(AtomicU64::new(0));
    let checksum = Arc::new(AtomicU64::new(0));

    thread::scope(|s| {
        for p in 0..producers {
            let rb = &rb;
            s.spawn(move || {
                for i in 0..msgs_per_producer {
                    let value = (p * msgs_per_producer + i) as u32;
                    while rb.enqueue(&meta(p as i32), &value.to_le_bytes()).is_err() {
                        thread::yield_now();
                    }
                }
            });
        }

        for _ in 0..consumers {
            let rb = &rb;
            let received = Arc::clone(&received);
            let checksum = Arc::clone(&checksum);
            s.spawn(move || loop {
                let got = rb.dequeue_with(|_, payload| {
                    u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]])
                });
                match got {
                    Some(value) => {
                        checksum.fetch_add(u64::from(value), Ordering::Relaxed);
                        received.fetch_add(1, Ordering::Relaxed);
                    }
                    None if received.load(Ordering::Relaxed) >= total as u64 => break,
                    None => thread::yield_now(),
                }
            });
        }
    });

    let n = total as u64;
    assert_eq!(received.load(Ordering::SeqCst), n);
    assert_eq!(checksum.load(Ordering::SeqCst), n * (n - 1) / 2);
}

#[test]
fn waiter_wakes_on_signal() {
    let entry = create_dummy_channel_entry(4);
    let backing = Backing::new(4);
    let rb = ring(&entry, &backing);

    thread::scope(|s| {
        let seen = rb.signal_value();
        let rb = &rb;
        let waiter = s.spawn(move || {
            let started = Instant::now();
            rb.wait_for_data(seen, Duration::from_secs(10));
            started.elapsed()
        });

        thread::sleep(Duration::from_millis(50));
        rb.enqueue(&meta(1), b"x").unwrap();
        rb.signal_consumer();

        let waited = waiter.join().unwrap();
        assert!(waited < Duration::from_secs(5));
    });
    assert!(rb.dequeue().is_some());
}

#[test]
fn wait_times_out_without_signal() {
    let entry = create_dummy_channel_entry(4);
    let backing = Backing::new(4);
    let rb = ring(&entry, &backing);

    let started = Instant::now();
    rb.wait_for_data(rb.signal_value(), Duration::from_millis(50));
    assert!(started.elapsed() >= Duration::from_millis(40));
}

#[test]
fn mpmc_throughput_print() {
    let capacity = 256;
    let entry = create_dummy_channel_entry(capacity as u64);
    let backing = Backing::new(capacity);
    let rb = ring(&entry, &backing);
    let count = 100_000;

    let start = Instant::now();
    thread::scope(|s| {
        s.spawn(|| {
            let payload = [0u8; 8];
            for _ in 0..count {
                while rb.enqueue(&meta(0), &payload).is_err() {
                    std::hint::spin_loop();
                }
            }
        });
        s.spawn(|| {
            let mut rx = 0;
            while rx < count {
                if rb.dequeue_with(|_, _| ()).is_some() {
                    rx += 1;
                } else {
                    std::hint::spin_loop();
                }
            }
        });
    });

    let elapsed = start.elapsed();
    println!(
        "Throughput: {:.2} million ops/sec",
        (count as f64 / elapsed.as_secs_f64()) / 1_000_000.0
    );
}
