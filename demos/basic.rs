use ringq::{MpmcQueue, MpscQueue, RingQueue, SpmcQueue, SpscQueue};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

fn main() {
    println!("ringq — endpoint walkthrough");
    println!("=============================\n");

    spsc_demo();
    mpsc_demo();
    spmc_demo();
    mpmc_demo();
}

fn spsc_demo() {
    println!("SPSC: one producer, one consumer, both wait-free");

    let queue = Arc::new(SpscQueue::<u64>::with_capacity(1024).unwrap());
    const ITEMS: u64 = 1_000_000;

    let start = Instant::now();
    let producer = Arc::clone(&queue);
    let handle = thread::spawn(move || {
        for i in 0..ITEMS {
            while !producer.offer(i) {
                thread::yield_now();
            }
        }
    });

    let mut sum = 0u64;
    let mut received = 0u64;
    while received < ITEMS {
        received += queue.drain(4096, |v| sum += v) as u64;
    }
    handle.join().unwrap();

    println!("  {ITEMS} items, sum {sum}, {:.2?}\n", start.elapsed());
}

fn mpsc_demo() {
    println!("MPSC: many producers race a CAS on tail, one consumer drains");

    const PRODUCERS: usize = 4;
    const PER_PRODUCER: u64 = 250_000;

    let queue = Arc::new(MpscQueue::<u64>::with_capacity(1024).unwrap());
    let start = Instant::now();

    let handles: Vec<_> = (0..PRODUCERS)
        .map(|id| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for i in 0..PER_PRODUCER {
                    while !queue.offer(id as u64 * PER_PRODUCER + i) {
                        thread::yield_now();
                    }
                }
            })
        })
        .collect();

    let total = PRODUCERS as u64 * PER_PRODUCER;
    let mut received = 0u64;
    while received < total {
        received += queue.drain(4096, |_| {}) as u64;
    }
    for h in handles {
        h.join().unwrap();
    }

    println!("  {total} items from {PRODUCERS} producers, {:.2?}\n", start.elapsed());
}

fn spmc_demo() {
    println!("SPMC: one producer, many consumers race a CAS on head");

    const CONSUMERS: usize = 4;
    const ITEMS: u64 = 1_000_000;

    let queue = Arc::new(SpmcQueue::<u64>::with_capacity(1024).unwrap());
    let start = Instant::now();

    let producer = Arc::clone(&queue);
    let producer_handle = thread::spawn(move || {
        for i in 0..ITEMS {
            while !producer.offer(i) {
                thread::yield_now();
            }
        }
    });

    let consumed = Arc::new(AtomicU64::new(0));
    let consumer_handles: Vec<_> = (0..CONSUMERS)
        .map(|_| {
            let queue = Arc::clone(&queue);
            let consumed = Arc::clone(&consumed);
            thread::spawn(move || {
                let mut local = 0u64;
                while consumed.load(Ordering::Relaxed) < ITEMS {
                    if queue.poll().is_some() {
                        local += 1;
                        consumed.fetch_add(1, Ordering::Relaxed);
                    } else {
                        thread::yield_now();
                    }
                }
                local
            })
        })
        .collect();

    producer_handle.join().unwrap();
    let shares: Vec<u64> = consumer_handles.into_iter().map(|h| h.join().unwrap()).collect();

    println!(
        "  {ITEMS} items split across {CONSUMERS} consumers as {shares:?}, {:.2?}\n",
        start.elapsed()
    );
}

fn mpmc_demo() {
    println!("MPMC: many producers, many consumers, both sides lock-free");

    const PRODUCERS: usize = 4;
    const CONSUMERS: usize = 4;
    const PER_PRODUCER: u64 = 250_000;
    const TOTAL: u64 = PRODUCERS as u64 * PER_PRODUCER;

    let queue = Arc::new(MpmcQueue::<u64>::with_capacity(1024).unwrap());
    let start = Instant::now();

    let producer_handles: Vec<_> = (0..PRODUCERS)
        .map(|id| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for i in 0..PER_PRODUCER {
                    while !queue.offer(id as u64 * PER_PRODUCER + i) {
                        thread::yield_now();
                    }
                }
            })
        })
        .collect();

    let consumed = Arc::new(AtomicU64::new(0));
    let consumer_handles: Vec<_> = (0..CONSUMERS)
        .map(|_| {
            let queue = Arc::clone(&queue);
            let consumed = Arc::clone(&consumed);
            thread::spawn(move || {
                let mut local = 0u64;
                while consumed.load(Ordering::Relaxed) < TOTAL {
                    if queue.poll().is_some() {
                        local += 1;
                        consumed.fetch_add(1, Ordering::Relaxed);
                    } else {
                        thread::yield_now();
                    }
                }
                local
            })
        })
        .collect();

    for h in producer_handles {
        h.join().unwrap();
    }
    let shares: Vec<u64> = consumer_handles.into_iter().map(|h| h.join().unwrap()).collect();

    println!(
        "  {TOTAL} items from {PRODUCERS} producers split across {CONSUMERS} consumers as {shares:?}, {:.2?}",
        start.elapsed()
    );
}
