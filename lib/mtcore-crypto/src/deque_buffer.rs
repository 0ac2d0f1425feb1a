// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
use std::ops::{Index, IndexMut};
use std::slice::SliceIndex;

/// A contiguous buffer that can grow at both ends.
///
/// Outgoing packets are built back to front: the body is appended first and
/// every layer (message header, encryption envelope, transport frame) then
/// prepends its own header. Reserving space at the front up-front means
/// those prepends are plain copies instead of memory moves.
///
/// Unlike [`VecDeque`](std::collections::VecDeque), the contents are always
/// contiguous and can be viewed as a single slice.
#[derive(Clone, Debug)]
pub struct DequeBuffer<T: Copy + Default> {
    buffer: Vec<T>,
    head: usize,
    reserved_front: usize,
}

impl<T: Copy + Default> DequeBuffer<T> {
    /// Create an empty buffer able to hold `back_capacity` elements without reallocating,
    /// and exactly `front_capacity` elements before it has to move memory on prepend.
    pub fn with_capacity(back_capacity: usize, front_capacity: usize) -> Self {
        let mut buffer = Vec::with_capacity(front_capacity + back_capacity);
        buffer.resize(front_capacity, T::default());
        Self {
            buffer,
            head: front_capacity,
            reserved_front: front_capacity,
        }
    }

    /// Remove all values, restoring the originally reserved front space.
    pub fn clear(&mut self) {
        self.buffer.truncate(self.reserved_front);
        self.buffer.fill(T::default());
        self.head = self.reserved_front;
    }

    /// Prepend a copy of `slice`.
    ///
    /// If there isn't enough front space left, the contents are moved back once.
    pub fn extend_front(&mut self, slice: &[T]) {
        if let Some(head) = self.head.checked_sub(slice.len()) {
            self.head = head;
        } else {
            let missing = slice.len() - self.head;
            self.buffer.resize(self.buffer.len() + missing, T::default());
            self.buffer.rotate_right(missing);
            self.head = 0;
        }
        self.buffer[self.head..self.head + slice.len()].copy_from_slice(slice);
    }

    /// Append a single value.
    pub fn push(&mut self, value: T) {
        self.buffer.push(value)
    }

    /// Whether there are no values in the buffer.
    pub fn is_empty(&self) -> bool {
        self.head == self.buffer.len()
    }

    /// The amount of values in the buffer.
    pub fn len(&self) -> usize {
        self.buffer.len() - self.head
    }
}

impl<T: Copy + Default> AsRef<[T]> for DequeBuffer<T> {
    fn as_ref(&self) -> &[T] {
        &self.buffer[self.head..]
    }
}

impl<T: Copy + Default> AsMut<[T]> for DequeBuffer<T> {
    fn as_mut(&mut self) -> &mut [T] {
        &mut self.buffer[self.head..]
    }
}

impl<T: Copy + Default, I: SliceIndex<[T]>> Index<I> for DequeBuffer<T> {
    type Output = I::Output;

    fn index(&self, index: I) -> &Self::Output {
        &self.as_ref()[index]
    }
}

impl<T: Copy + Default, I: SliceIndex<[T]>> IndexMut<I> for DequeBuffer<T> {
    fn index_mut(&mut self, index: I) -> &mut Self::Output {
        &mut self.as_mut()[index]
    }
}

impl<T: Copy + Default> Extend<T> for DequeBuffer<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.buffer.extend(iter)
    }
}

impl<'a, T: Copy + Default + 'a> Extend<&'a T> for DequeBuffer<T> {
    fn extend<I: IntoIterator<Item = &'a T>>(&mut self, iter: I) {
        self.buffer.extend(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Render the whole backing storage, marking the head with `|`.
    fn layout(deque: &DequeBuffer<u8>) -> String {
        let mut out = String::from("[");
        for (i, value) in deque.buffer.iter().enumerate() {
            out.push(if i == deque.head { '|' } else { ' ' });
            out.push_str(&value.to_string());
        }
        if deque.head == deque.buffer.len() {
            out.push('|');
        }
        out.push(']');
        out
    }

    #[test]
    fn starts_empty_with_reserved_front() {
        let deque = DequeBuffer::<u8>::with_capacity(8, 3);
        assert!(deque.is_empty());
        assert_eq!(deque.len(), 0);
        assert_eq!(layout(&deque), "[ 0 0 0|]");
    }

    #[test]
    fn prepends_into_reserved_space() {
        let mut deque = DequeBuffer::<u8>::with_capacity(8, 4);
        deque.extend([5, 6]);
        deque.extend_front(&[3, 4]);
        assert_eq!(layout(&deque), "[ 0 0|3 4 5 6]");
        assert_eq!(deque.as_ref(), &[3, 4, 5, 6]);
        assert_eq!(deque[1..3], [4, 5]);
    }

    #[test]
    fn prepending_past_reserved_space_moves_once() {
        let mut deque = DequeBuffer::<u8>::with_capacity(2, 2);
        deque.push(9);
        deque.extend_front(&[1, 2, 3]);
        assert_eq!(layout(&deque), "[|1 2 3 9]");
        assert_eq!(deque.len(), 4);

        deque.extend_front(&[7]);
        assert_eq!(deque.as_ref(), &[7, 1, 2, 3, 9]);
    }

    #[test]
    fn clear_restores_front() {
        let mut deque = DequeBuffer::<u8>::with_capacity(4, 2);
        deque.extend(&[1, 2, 3]);
        deque.extend_front(&[8, 8, 8]);
        deque.clear();
        assert!(deque.is_empty());
        assert_eq!(layout(&deque), "[ 0 0|]");
    }

    #[test]
    fn mutation_through_index() {
        let mut deque = DequeBuffer::<u8>::with_capacity(4, 1);
        deque.extend([1, 2, 3]);
        deque[0] = 10;
        deque.as_mut()[2] = 30;
        assert_eq!(deque.as_ref(), &[10, 2, 30]);
    }
}
