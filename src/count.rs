use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use crate::base_primes::base_primes;
use crate::errors::CountError;

/// Default segment length in numbers. One flag per number keeps the
/// whole segment buffer cache-resident; larger segments trade that
/// against fewer trips to the work queue and never change the count.
pub const DEFAULT_SEGMENT_SIZE: usize = 64 * 1024;

/// Count primes strictly below `limit`, with one worker per available
/// CPU.
pub fn count_primes_below(limit: usize, segment_size: usize) -> Result<usize, CountError> {
    let workers = thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);
    count_primes_below_with_workers(limit, segment_size, workers)
}

/// Count primes strictly below `limit` using an explicit worker count.
///
/// Segments [k*segment_size, min((k+1)*segment_size, limit)) tile
/// [0, limit) exactly. Workers pull segment indices from a shared
/// atomic cursor until it passes the segment count, sieve each segment
/// against the base primes in a private buffer, and accumulate a
/// private survivor count. The per-worker counts are summed once after
/// every worker has joined, so no lock or shared counter sits in the
/// hot loop. A panicking worker propagates through the join and aborts
/// the whole count.
pub fn count_primes_below_with_workers(
    limit: usize,
    segment_size: usize,
    workers: usize,
) -> Result<usize, CountError> {
    if segment_size == 0 {
        return Err(CountError::SegmentSize);
    }
    if workers == 0 {
        return Err(CountError::Workers);
    }
    if limit < 2 {
        return Ok(0);
    }

    let base = base_primes(limit);
    let total_segments = limit.div_ceil(segment_size);
    let next_segment = AtomicUsize::new(0);

    let total = thread::scope(|scope| {
        let mut handles = Vec::with_capacity(workers);

        for _ in 0..workers {
            handles.push(scope.spawn(|| {
                let mut composite: Vec<bool> = Vec::new();
                let mut local = 0;

                // Pull segments from the shared cursor until exhausted
                loop {
                    let k = next_segment.fetch_add(1, Ordering::Relaxed);
                    if k >= total_segments {
                        break;
                    }

                    // k*segment_size < limit for every issued index
                    let start = k * segment_size;
                    let end = start.saturating_add(segment_size).min(limit);
                    local += sieve_segment(start, end, &base, &mut composite);
                }

                local
            }));
        }

        handles.into_iter().map(|h| h.join().unwrap()).sum()
    });

    Ok(total)
}

/// Sieve one segment [start, end) against the base primes and return
/// the number of survivors with value >= 2. The composite buffer is
/// owned by the calling worker and reused between its segments.
fn sieve_segment(start: usize, end: usize, base: &[usize], composite: &mut Vec<bool>) -> usize {
    let len = end - start;
    composite.clear();
    composite.resize(len, false);

    for &p in base {
        // Any composite in [start, end) has a prime factor <=
        // sqrt(end - 1), so larger base primes strike nothing new
        if p.saturating_mul(p) >= end {
            break;
        }

        // Smallest multiple of p at or past the segment start
        let mut first = start / p * p;
        if first < start {
            first = match first.checked_add(p) {
                Some(f) => f,
                None => continue,
            };
        }
        // Multiples below p*p were struck by smaller primes, and
        // starting at p*p leaves p itself unmarked when it falls in
        // this segment
        first = first.max(p * p);

        let mut i = first.saturating_sub(start);
        while i < len {
            composite[i] = true;
            i += p;
        }
    }

    // 0 and 1 are never prime, so counting starts at global value 2
    let from = start.max(2) - start;
    if from >= len {
        return 0;
    }
    composite[from..].iter().filter(|&&c| !c).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference;

    #[test]
    fn test_trivial_bounds() {
        for limit in 0..2 {
            for segment_size in [1, 3, 10] {
                assert_eq!(count_primes_below(limit, segment_size), Ok(0));
            }
        }
    }

    #[test]
    fn test_below_ten() {
        // 2, 3, 5, 7
        for segment_size in [1, 2, 3, 5, 10] {
            assert_eq!(count_primes_below(10, segment_size), Ok(4));
        }
    }

    #[test]
    fn test_segment_size_independence() {
        for segment_size in [1, 7, 10, 50, 100, 1000] {
            assert_eq!(count_primes_below(100, segment_size), Ok(25));
        }
    }

    #[test]
    fn test_one_million() {
        assert_eq!(count_primes_below(1_000_000, 10_000), Ok(78_498));
        assert_eq!(
            count_primes_below(1_000_000, DEFAULT_SEGMENT_SIZE),
            Ok(78_498)
        );
    }

    #[test]
    fn test_segment_boundary_alignment() {
        // 7 does not divide 1000; 1000 does
        assert_eq!(count_primes_below(1_000, 7), Ok(168));
        assert_eq!(count_primes_below(1_000, 1_000), Ok(168));
    }

    #[test]
    fn test_idempotent() {
        let first = count_primes_below(50_000, 1_024);
        for _ in 0..3 {
            assert_eq!(count_primes_below(50_000, 1_024), first);
        }
    }

    #[test]
    fn test_monotonic_in_limit() {
        let mut prev = 0;
        for limit in (0..5_000).step_by(123) {
            let count = count_primes_below(limit, 64).unwrap();
            assert!(count >= prev, "count dropped at limit {}", limit);
            prev = count;
        }
    }

    #[test]
    fn test_matches_reference() {
        for limit in [0, 1, 2, 3, 4, 10, 97, 100, 1_000, 4_096, 9_999, 10_000] {
            assert_eq!(
                count_primes_below(limit, 100).unwrap(),
                reference::count_primes_below(limit),
                "mismatch at limit {}",
                limit
            );
        }
    }

    #[test]
    fn test_worker_count_independence() {
        for workers in 1..=4 {
            assert_eq!(
                count_primes_below_with_workers(10_000, 512, workers),
                Ok(1_229)
            );
        }
    }

    #[test]
    fn test_rejects_zero_segment_size() {
        assert_eq!(count_primes_below(100, 0), Err(CountError::SegmentSize));
    }

    #[test]
    fn test_rejects_zero_workers() {
        assert_eq!(
            count_primes_below_with_workers(100, 10, 0),
            Err(CountError::Workers)
        );
    }
}
