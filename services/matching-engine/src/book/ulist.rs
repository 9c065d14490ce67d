//! Unrolled linked list of price levels for one side of a book
//!
//! Levels live in fixed-size sorted buckets chained best-first. The buckets
//! themselves sit in one `Vec` and link by index: the data region runs from
//! `begin` up to (excluding) `dend`, and everything from `dend` onwards is the
//! free pool. Splitting a full bucket takes the bucket after `dend`; emptied
//! buckets go back right after `dend`. Capacity doubles only when the pool is
//! exhausted.
//!
//! Most activity touches the head of the list (matching, inserts near the
//! best price), while depth snapshots and expiry sweeps walk it in order.

use std::cmp::Ordering;
use std::iter;

use types::numeric::Price;
use types::order::Side;

use super::price_level::PriceLevel;

pub const DEFAULT_CAPACITY: usize = 10_000;
pub const DEFAULT_BUCKET_SIZE: usize = 16;

#[derive(Debug, Clone, Default)]
struct Bucket {
    next: Option<usize>,
    elements: Vec<PriceLevel>,
}

/// Result of a binary search inside one bucket
enum Slot {
    Found(usize),
    Vacant(usize),
}

#[derive(Debug, Clone)]
pub struct ULList {
    buckets: Vec<Bucket>,
    begin: usize,
    dend: usize,
    capacity: usize,
    bucket_size: usize,
    side: Side,
}

impl ULList {
    /// Create a list ordered for `side`: buy levels descend, sell levels ascend
    pub fn new(capacity: usize, bucket_size: usize, side: Side) -> Self {
        let bucket_size = bucket_size.max(1);
        let capacity = capacity.max(bucket_size);
        let bucket_number = capacity / bucket_size + 1;
        let buckets = (0..bucket_number)
            .map(|i| Bucket {
                next: if i + 1 < bucket_number { Some(i + 1) } else { None },
                elements: Vec::with_capacity(bucket_size),
            })
            .collect();
        Self {
            buckets,
            begin: 0,
            dend: 1,
            capacity,
            bucket_size,
            side,
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    /// `Greater` when `p1` ranks ahead of `p2` on this side
    pub fn compare(&self, p1: Price, p2: Price) -> Ordering {
        match self.side {
            Side::BUY => p1.cmp(&p2),
            Side::SELL => p2.cmp(&p1),
        }
    }

    fn search(&self, bucket: usize, price: Price) -> Slot {
        let elements = &self.buckets[bucket].elements;
        let i = elements.partition_point(|e| self.compare(e.price, price) != Ordering::Less);
        if i > 0 && self.compare(elements[i - 1].price, price) == Ordering::Equal {
            Slot::Found(i - 1)
        } else {
            Slot::Vacant(i)
        }
    }

    fn data_buckets(&self) -> impl Iterator<Item = usize> + '_ {
        iter::successors(Some(self.begin), move |&i| self.buckets[i].next)
            .take_while(move |&i| i != self.dend)
    }

    /// Index of the last data bucket whose head ranks at or ahead of `price`
    ///
    /// `None` means `price` ranks ahead of every stored level.
    fn find_bucket(&self, price: Price) -> Option<usize> {
        let mut last = None;
        for b in self.data_buckets() {
            if let Some(head) = self.buckets[b].elements.first() {
                if self.compare(head.price, price) == Ordering::Less {
                    break;
                }
            }
            last = Some(b);
        }
        last
    }

    /// Append `capacity / bucket_size` more buckets behind `dend`
    fn grow(&mut self) -> usize {
        let old_number = self.buckets.len();
        self.capacity *= 2;
        let new_number = (self.capacity / self.bucket_size + 1).max(old_number + 1);
        for i in old_number..new_number {
            self.buckets.push(Bucket {
                next: if i + 1 < new_number { Some(i + 1) } else { None },
                elements: Vec::with_capacity(self.bucket_size),
            });
        }
        self.buckets[self.dend].next = Some(old_number);
        old_number
    }

    /// Unlink the first free bucket after `dend`
    fn take_free_bucket(&mut self) -> usize {
        let idx = match self.buckets[self.dend].next {
            Some(idx) => idx,
            None => self.grow(),
        };
        self.buckets[self.dend].next = self.buckets[idx].next.take();
        self.buckets[idx].elements.clear();
        idx
    }

    fn insert_into(&mut self, bucket: usize, level: PriceLevel) -> bool {
        match self.search(bucket, level.price) {
            Slot::Found(_) => false,
            Slot::Vacant(pos) => {
                self.buckets[bucket].elements.insert(pos, level);
                true
            }
        }
    }

    /// Move the tail of a full bucket, starting at the insert position, into
    /// a fresh bucket led by the new level
    fn split_and_insert(&mut self, origin: usize, level: PriceLevel) -> bool {
        let pos = match self.search(origin, level.price) {
            Slot::Found(_) => return false,
            Slot::Vacant(pos) => pos,
        };
        let fresh = self.take_free_bucket();
        let tail = self.buckets[origin].elements.split_off(pos);
        let origin_next = self.buckets[origin].next.replace(fresh);
        let new_bucket = &mut self.buckets[fresh];
        new_bucket.elements.push(level);
        new_bucket.elements.extend(tail);
        new_bucket.next = origin_next;
        true
    }

    /// Add a level whose price is not present yet; returns false otherwise
    pub fn add_price_level(&mut self, level: PriceLevel) -> bool {
        match self.find_bucket(level.price) {
            None => {
                if self.buckets[self.begin].elements.len() >= self.bucket_size {
                    let fresh = self.take_free_bucket();
                    self.buckets[fresh].next = Some(self.begin);
                    self.begin = fresh;
                }
                let begin = self.begin;
                self.insert_into(begin, level)
            }
            Some(last) if self.buckets[last].elements.len() >= self.bucket_size => {
                self.split_and_insert(last, level)
            }
            Some(last) => self.insert_into(last, level),
        }
    }

    /// Remove the level at `price`, returning it if it existed
    pub fn delete_price_level(&mut self, price: Price) -> Option<PriceLevel> {
        let mut last = None;
        let mut last_of_last = None;
        for b in self.data_buckets() {
            if let Some(head) = self.buckets[b].elements.first() {
                if self.compare(head.price, price) == Ordering::Less {
                    break;
                }
            }
            last_of_last = last;
            last = Some(b);
        }
        let last = last?;
        let pos = match self.search(last, price) {
            Slot::Found(pos) => pos,
            Slot::Vacant(_) => return None,
        };
        let removed = self.buckets[last].elements.remove(pos);

        if self.buckets[last].elements.is_empty() {
            let old_next = self.buckets[last].next;
            match last_of_last {
                None => {
                    if old_next == Some(self.dend) {
                        // only data bucket stays in place
                        return Some(removed);
                    }
                    match old_next {
                        Some(next) => self.begin = next,
                        None => return Some(removed),
                    }
                }
                Some(prev) => self.buckets[prev].next = old_next,
            }
            let old_free = self.buckets[self.dend].next;
            self.buckets[self.dend].next = Some(last);
            self.buckets[last].next = old_free;
        }
        Some(removed)
    }

    /// Best level on this side
    pub fn get_top(&self) -> Option<&PriceLevel> {
        self.buckets[self.begin].elements.first()
    }

    pub fn get_price_level(&self, price: Price) -> Option<&PriceLevel> {
        let b = self.find_bucket(price)?;
        match self.search(b, price) {
            Slot::Found(pos) => self.buckets[b].elements.get(pos),
            Slot::Vacant(_) => None,
        }
    }

    pub fn get_price_level_mut(&mut self, price: Price) -> Option<&mut PriceLevel> {
        let b = self.find_bucket(price)?;
        match self.search(b, price) {
            Slot::Found(pos) => self.buckets[b].elements.get_mut(pos),
            Slot::Vacant(_) => None,
        }
    }

    /// Levels from `p1` (better) down to `p2` (worse), both inclusive
    pub fn get_price_range(&self, p1: Price, p2: Price) -> Vec<&PriceLevel> {
        if self.compare(p1, p2) == Ordering::Less {
            return Vec::new();
        }
        self.iter()
            .skip_while(|l| self.compare(p1, l.price) == Ordering::Less)
            .take_while(|l| self.compare(l.price, p2) != Ordering::Less)
            .collect()
    }

    /// Levels in priority order, best first
    pub fn iter(&self) -> impl Iterator<Item = &PriceLevel> + '_ {
        self.data_buckets()
            .flat_map(move |b| self.buckets[b].elements.iter())
    }

    /// Prices in priority order, best first
    pub fn prices(&self) -> Vec<Price> {
        self.iter().map(|l| l.price).collect()
    }

    pub fn len(&self) -> usize {
        self.data_buckets()
            .map(|b| self.buckets[b].elements.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.get_top().is_none()
    }

    /// Drop every level, keeping the allocated buckets
    pub fn clear(&mut self) {
        let n = self.buckets.len();
        for (i, bucket) in self.buckets.iter_mut().enumerate() {
            bucket.elements.clear();
            bucket.next = if i + 1 < n { Some(i + 1) } else { None };
        }
        self.begin = 0;
        self.dend = 1;
    }

    /// Number of buckets currently holding data
    pub fn bucket_count(&self) -> usize {
        self.data_buckets().count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
