//! Contains the deferred command queue and its user-facing facade.
//!
//! Systems must not mutate the registry while a stage is running; instead
//! they enqueue closures here and the scheduler drains the queue between
//! stages. The queue is a singly-linked list with a dummy tail node and two
//! locks: producers contend only on the tail lock, the drain takes both.
//! Commands pushed by one thread are applied in that thread's push order.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use tracing::trace;

use crate::internals::component::{has_duplicate_type_ids, ComponentSet};
use crate::internals::entity::Entity;
use crate::internals::registry::ComponentBundle;
use crate::internals::systems::resources::Resource;
use crate::internals::world::World;

/// A deferred world mutation.
pub type Command = Box<dyn FnOnce(&mut World) + Send>;

struct Node {
    data: Option<Command>,
    next: Option<Box<Node>>,
}

impl Node {
    fn dummy() -> Box<Node> {
        Box::new(Node { data: None, next: None })
    }
}

/// A thread-safe FIFO of deferred world mutations.
///
/// Lock order is head before tail; producers take only the tail lock.
pub struct CommandQueue {
    head: Mutex<Box<Node>>,
    tail: Mutex<*mut Node>,
    ready: Condvar,
}

// The tail pointer always refers into the chain owned by `head`, and every
// access happens under one of the two mutexes.
unsafe impl Send for CommandQueue {}
unsafe impl Sync for CommandQueue {}

impl Default for CommandQueue {
    fn default() -> Self {
        let mut dummy = Node::dummy();
        let tail: *mut Node = &mut *dummy;
        Self {
            head: Mutex::new(dummy),
            tail: Mutex::new(tail),
            ready: Condvar::new(),
        }
    }
}

impl CommandQueue {
    /// Constructs an empty queue.
    pub fn new() -> Self { Self::default() }

    /// Appends a command to the back of the queue.
    pub fn push(&self, command: Command) {
        let mut new_dummy = Node::dummy();
        let new_tail: *mut Node = &mut *new_dummy;

        {
            let mut tail = self.tail.lock();
            // Fill the current dummy and hang a fresh one behind it.
            unsafe {
                (**tail).data = Some(command);
                (**tail).next = Some(new_dummy);
            }
            *tail = new_tail;
        }

        self.ready.notify_one();
    }

    /// Removes and returns the front command, or `None` when empty.
    pub fn try_pop(&self) -> Option<Command> {
        let mut head = self.head.lock();
        if std::ptr::eq(&**head, self.tail_ptr()) {
            return None;
        }
        Self::pop_front(&mut head)
    }

    /// Removes and returns the front command, blocking until one arrives.
    pub fn wait_and_pop(&self) -> Command {
        let mut head = self.head.lock();
        loop {
            if !std::ptr::eq(&**head, self.tail_ptr()) {
                // Non-empty while we hold the head lock.
                if let Some(command) = Self::pop_front(&mut head) {
                    return command;
                }
            }
            self.ready.wait(&mut head);
        }
    }

    /// Returns `true` if no commands are queued.
    pub fn is_empty(&self) -> bool {
        let head = self.head.lock();
        std::ptr::eq(&**head, self.tail_ptr())
    }

    /// Drains the queue in FIFO order and applies every command to the
    /// world.
    ///
    /// The drain detaches the whole chain under both locks first, so
    /// commands enqueued *while applying* (for example by another thread)
    /// are left for the next drain, and commands themselves may safely
    /// enqueue follow-ups.
    pub fn apply(&self, world: &mut World) {
        let mut drained = self.detach_all();
        let mut applied = 0usize;
        while let Some(command) = drained.next() {
            command(world);
            applied += 1;
        }
        if applied > 0 {
            trace!(commands = applied, "applied deferred commands");
        }
    }

    /// Drops every queued command without applying it.
    pub fn clear(&self) {
        let mut drained = self.detach_all();
        while drained.next().is_some() {}
    }

    fn tail_ptr(&self) -> *const Node { *self.tail.lock() }

    fn pop_front(head: &mut Box<Node>) -> Option<Command> {
        let next = head.next.take()?;
        let mut old_head = std::mem::replace(head, next);
        old_head.data.take()
    }

    // Swaps the whole chain out for a fresh dummy node, under both locks.
    fn detach_all(&self) -> Drain {
        let mut head = self.head.lock();
        let mut tail = self.tail.lock();

        let mut new_dummy = Node::dummy();
        let new_tail: *mut Node = &mut *new_dummy;

        let chain = std::mem::replace(&mut *head, new_dummy);
        *tail = new_tail;

        Drain { chain: Some(chain) }
    }
}

struct Drain {
    chain: Option<Box<Node>>,
}

impl Iterator for Drain {
    type Item = Command;

    fn next(&mut self) -> Option<Command> {
        // The last node of the chain is the old dummy; it has no data.
        loop {
            let mut node = self.chain.take()?;
            self.chain = node.next.take();
            if let Some(command) = node.data.take() {
                return Some(command);
            }
        }
    }
}

impl Drop for CommandQueue {
    fn drop(&mut self) {
        // Unlink iteratively so long chains cannot overflow the stack on
        // recursive Box drops.
        let mut node = self.head.get_mut().next.take();
        while let Some(mut next) = node {
            node = next.next.take();
        }
    }
}

/// Facade over the command queue used inside systems.
///
/// Cloning is cheap; every clone pushes into the same queue. The methods
/// chain: `commands.spawn((PosA,)).destroy(old)`.
#[derive(Clone, Default)]
pub struct Commands {
    queue: Arc<CommandQueue>,
}

impl Commands {
    /// Constructs a facade over a fresh queue.
    pub fn new() -> Self { Self::default() }

    /// Queues the creation of an entity with the bundled components.
    ///
    /// # Panics
    ///
    /// Panics if the bundle names the same component type twice.
    pub fn spawn<B: ComponentBundle>(&self, bundle: B) -> &Self {
        assert!(
            !has_duplicate_type_ids(&B::type_ids()),
            "duplicate component types in spawn bundle"
        );
        self.queue.push(Box::new(move |world| {
            let entity = world.registry_mut().create_entity();
            bundle.attach(world.registry_mut(), entity);
        }));
        self
    }

    /// Queues the destruction of an entity.
    pub fn destroy(&self, entity: Entity) -> &Self {
        self.queue.push(Box::new(move |world| {
            world.registry_mut().destroy_entity(entity);
        }));
        self
    }

    /// Queues attaching the bundled components to an entity.
    ///
    /// # Panics
    ///
    /// Panics if the bundle names the same component type twice.
    pub fn attach<B: ComponentBundle>(&self, entity: Entity, bundle: B) -> &Self {
        assert!(
            !has_duplicate_type_ids(&B::type_ids()),
            "duplicate component types in attach bundle"
        );
        self.queue.push(Box::new(move |world| {
            bundle.attach(world.registry_mut(), entity);
        }));
        self
    }

    /// Queues detaching the named component types from an entity.
    ///
    /// # Panics
    ///
    /// Panics if the set names the same component type twice.
    pub fn detach<S: ComponentSet>(&self, entity: Entity) -> &Self {
        let type_ids = S::type_ids();
        assert!(
            !has_duplicate_type_ids(&type_ids),
            "duplicate component types in detach set"
        );
        self.queue.push(Box::new(move |world| {
            for type_id in &type_ids {
                world.registry_mut().detach_by_id(entity, *type_id);
            }
        }));
        self
    }

    /// Queues an arbitrary world mutation.
    ///
    /// For the structural changes the dedicated methods cover, prefer
    /// those; `exec_mut` is the escape hatch for everything else.
    pub fn exec_mut<F>(&self, f: F) -> &Self
    where
        F: FnOnce(&mut World) + Send + 'static,
    {
        self.queue.push(Box::new(f));
        self
    }

    /// Queues inserting a resource, overwriting any existing instance.
    pub fn add_resource<R: Resource>(&self, resource: R) -> &Self {
        self.queue.push(Box::new(move |world| {
            world.resources_mut().insert(resource);
        }));
        self
    }

    /// Queues removing a resource.
    pub fn remove_resource<R: Resource>(&self) -> &Self {
        self.queue.push(Box::new(move |world| {
            world.resources_mut().remove::<R>();
        }));
        self
    }

    /// Returns `true` if nothing is queued.
    pub fn is_empty(&self) -> bool { self.queue.is_empty() }

    pub(crate) fn queue(&self) -> Arc<CommandQueue> { Arc::clone(&self.queue) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn fifo_within_a_thread() {
        let queue = CommandQueue::new();
        for value in 0..4u32 {
            queue.push(Box::new(move |world: &mut World| {
                world.resources_mut().get_or_insert_with(Vec::<u32>::new).push(value);
            }));
        }

        let mut world = World::new();
        queue.apply(&mut world);

        assert_eq!(
            world.resources().get::<Vec<u32>>().map(|v| v.clone()),
            Some(vec![0, 1, 2, 3])
        );
        assert!(queue.is_empty());
    }

    #[test]
    fn try_pop_on_empty() {
        let queue = CommandQueue::new();
        assert!(queue.try_pop().is_none());
        queue.push(Box::new(|_| {}));
        assert!(queue.try_pop().is_some());
        assert!(queue.try_pop().is_none());
    }

    #[test]
    fn concurrent_pushers_do_not_lose_commands() {
        let queue = Arc::new(CommandQueue::new());
        let mut handles = Vec::new();
        for _ in 0..4 {
            let queue = Arc::clone(&queue);
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    queue.push(Box::new(|world: &mut World| {
                        world.resources_mut().get_or_insert_with(|| 0usize);
                        if let Some(mut count) = world.resources().get_mut::<usize>() {
                            *count += 1;
                        }
                    }));
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let mut world = World::new();
        queue.apply(&mut world);
        assert_eq!(world.resources().get::<usize>().map(|c| *c), Some(400));
    }

    #[test]
    fn clear_discards_without_applying() {
        let queue = CommandQueue::new();
        queue.push(Box::new(|world: &mut World| {
            world.registry_mut().create_entity();
        }));
        queue.clear();

        let mut world = World::new();
        queue.apply(&mut world);
        assert_eq!(world.registry().entity_count(), 0);
    }
}
