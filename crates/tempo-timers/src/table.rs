use crate::{Result, TimerError, TimerId};

/// Arena of `T` keyed by small [`TimerId`]s, with a free list for id reuse.
///
/// `free` holds exactly the empty slots below `slots.len()`, each once. [`IdTable::alloc`] pops
/// from its end: most recently freed first, then gap ids in ascending order.
#[derive(Debug)]
pub(crate) struct IdTable<T> {
    slots: Vec<Option<T>>,
    free: Vec<u32>,
    max_ids: u32,
}

impl<T> IdTable<T> {
    pub(crate) fn new(max_ids: u32) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            max_ids,
        }
    }

    pub(crate) fn insert_at(&mut self, id: TimerId, value: T) -> Result<()> {
        if id.0 >= self.max_ids {
            return Err(TimerError::IdOutOfRange {
                id,
                max: self.max_ids,
            });
        }
        let idx = id.index();
        if idx >= self.slots.len() {
            self.free.extend((self.slots.len() as u32..id.0).rev());
            self.slots.resize_with(idx + 1, || None);
            self.slots[idx] = Some(value);
            return Ok(());
        }

        let slot = &mut self.slots[idx];
        if slot.is_some() {
            return Err(TimerError::DuplicateId(id));
        }
        *slot = Some(value);
        if let Some(pos) = self.free.iter().position(|&raw| raw == id.0) {
            self.free.remove(pos);
        }
        Ok(())
    }

    pub(crate) fn alloc(&mut self, value: T) -> Result<TimerId> {
        if let Some(raw) = self.free.pop() {
            self.slots[raw as usize] = Some(value);
            return Ok(TimerId(raw));
        }
        let raw = self.slots.len() as u32;
        if raw >= self.max_ids {
            return Err(TimerError::NoFreeIds);
        }
        self.slots.push(Some(value));
        Ok(TimerId(raw))
    }

    pub(crate) fn remove(&mut self, id: TimerId) -> Option<T> {
        let value = self.slots.get_mut(id.index())?.take()?;
        self.free.push(id.0);
        Some(value)
    }

    pub(crate) fn get(&self, id: TimerId) -> Option<&T> {
        self.slots.get(id.index())?.as_ref()
    }

    pub(crate) fn get_mut(&mut self, id: TimerId) -> Option<&mut T> {
        self.slots.get_mut(id.index())?.as_mut()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (TimerId, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| Some((TimerId(idx as u32), slot.as_ref()?)))
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (TimerId, &mut T)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(idx, slot)| Some((TimerId(idx as u32), slot.as_mut()?)))
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}
