// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

// All arithmetic is done in u128 so that products of two values below `pq` never overflow.

fn gcd(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

fn abs_diff(a: u128, b: u128) -> u128 {
    a.max(b) - a.min(b)
}

/// `f(x) = x² + c (mod n)`, the pseudo-random walk used by Pollard's rho.
fn step(x: u128, c: u128, n: u128) -> u128 {
    (x * x % n + c) % n
}

/// Split `pq` into its two factors, smallest first.
///
/// The server hands out a product of two primes (both fitting in 32 bits) which
/// has to be decomposed during the key exchange. This uses [Brent's variant] of
/// [Pollard's rho algorithm]. A few different polynomials are tried in turn
/// before giving up, in which case `None` is returned.
///
/// [Pollard's rho algorithm]: https://en.wikipedia.org/wiki/Pollard%27s_rho_algorithm
/// [Brent's variant]: https://maths-people.anu.edu.au/~brent/pd/rpb051i.pdf
pub fn factorize(pq: u64) -> Option<(u64, u64)> {
    if pq < 4 {
        return None;
    }
    if pq % 2 == 0 {
        return Some((2, pq / 2));
    }

    // Changing `c` changes `f(x) = x² + c`, so a failed walk can be retried with another.
    const ATTEMPTS: [u64; 5] = [43, 47, 53, 59, 61];
    ATTEMPTS.iter().find_map(|&attempt| {
        let divisor = brent(pq as u128, (attempt * (pq / 103)) as u128);
        (divisor != 1 && divisor != pq as u128).then(|| {
            let (p, q) = (divisor as u64, pq / divisor as u64);
            (p.min(q), p.max(q))
        })
    })
}

#[allow(clippy::many_single_char_names)]
fn brent(n: u128, c: u128) -> u128 {
    // Arbitrary starting points within 1..n.
    let mut y = 3 * (n / 7);
    let m = 7 * (n / 13);

    let mut g = 1;
    let mut r = 1;
    let mut q = 1;
    let mut x = 0;
    let mut ys = 0;

    while g == 1 {
        x = y;
        for _ in 0..r {
            y = step(y, c, n);
        }

        let mut k = 0;
        while k < r && g == 1 {
            ys = y;
            for _ in 0..m.min(r - k) {
                y = step(y, c, n);
                q = q * abs_diff(x, y) % n;
            }
            g = gcd(q, n);
            k += m;
        }

        r *= 2;
    }

    if g == n {
        // The batch overshot; walk back one step at a time from the saved point.
        loop {
            ys = step(ys, c, n);
            g = gcd(abs_diff(x, ys), n);
            if g > 1 {
                break;
            }
        }
    }

    g
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_factors(pq: u64, expected: (u64, u64)) {
        let (p, q) = factorize(pq).expect("factorization to succeed");
        assert_eq!((p, q), expected);
        assert_eq!(p * q, pq);
        assert!(p != 1 && q != 1);
    }

    #[test]
    fn factorizes_server_style_products() {
        assert_factors(1470626929934143021, (1206429347, 1218991343));
        assert_factors(2363612107535801713, (1518968219, 1556064227));
        assert_factors(2804275833720261793, (1555252417, 1803100129));
    }

    #[test]
    fn factorizes_even_products() {
        assert_factors(2000000000000000006, (2, 1000000000000000003));
    }

    #[test]
    fn rejects_trivial_input() {
        assert_eq!(factorize(0), None);
        assert_eq!(factorize(1), None);
        assert_eq!(factorize(3), None);
    }
}
