use crossbeam_channel::{unbounded, Sender};

use crate::{
    dispatch::Dispatcher,
    task::Executable
};

type Job = Box<dyn Executable + Send>;

/// Defines the characteristics of the `ThreadPool`.
#[derive(Debug)]
pub struct WorkersDescriptor {
    /// Contains the number of workers needed.
    pub amount: usize,
    /// A name used to identify the `ThreadPool`
    pub name: Option<String>
}

/// Defines a `ThreadPool`.
///
/// This allows execute tasks in a pool of threads (workers). Jobs pushed via
/// `Dispatcher::execute*` are pulled by whichever worker thread is free next;
/// there is no affinity between a job and a specific thread.
pub struct Workers {
    /// Contains the information about the workers.
    descriptor: WorkersDescriptor,

    /// The sending half of the job queue, held so jobs can be pushed after
    /// `start`. Dropping it closes the channel, which is how `Drop` below
    /// tells every worker's `recv` loop to exit.
    sender: Option<Sender<Job>>,

    handles: Vec<std::thread::JoinHandle<()>>,
}

impl std::fmt::Debug for Workers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workers")
            .field("descriptor", &self.descriptor)
            .field("running", &self.sender.is_some())
            .finish()
    }
}

/// Provides default constructors for `Workers`.
impl Workers {
    /// Creates and returns a new `Workers` using the provided descriptor.
    pub fn new(descriptor: WorkersDescriptor) -> Self {
        Self {
            descriptor,
            sender: None,
            handles: Vec::new(),
        }
    }
}

/// Provides a default constructor for `Workers`.
///
/// The amount of workers will be calculated based on the number of CPUs
/// that the host provides (number of cores * 2).
impl Default for Workers {
    /// Creates and returns a new `Worker` based on the default
    /// configuration.
    fn default() -> Self {
        Self::new(WorkersDescriptor {
            amount: num_cpus::get() * 2,
            name: None
        })
    }
}

impl Drop for Workers {
    /// Closes the job queue and joins every worker thread so the pool never
    /// outlives the `World` that owns it.
    fn drop(&mut self) {
        self.sender.take();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

/// Allow `Workers` to behave as a `Dispatcher`.
impl Dispatcher for Workers {
    /// Spawns `descriptor.amount` long-lived OS threads, each pulling jobs
    /// off the shared queue until the queue is closed.
    fn start(&mut self) {
        if self.sender.is_some() {
            return;
        }

        let (sender, receiver) = unbounded::<Job>();

        for i in 0..self.descriptor.amount {
            let receiver = receiver.clone();
            let thread_name = self
                .descriptor
                .name
                .as_deref()
                .map(|n| format!("{}-{}", n, i))
                .unwrap_or_else(|| format!("worker-{}", i));

            let handle = std::thread::Builder::new()
                .name(thread_name)
                .spawn(move || {
                    while let Ok(job) = receiver.recv() {
                        job.execute();
                    }
                })
                .expect("failed to spawn worker thread");

            self.handles.push(handle);
        }

        self.sender = Some(sender);
    }

    /// Executes the provided task as soon as a worker is free.
    ///
    /// # Arguments
    ///
    /// `task` - The task to be executed.
    fn execute<T: Executable + Send + 'static>(&self, task: T) {
        self.execute_dyn(Box::new(task));
    }

    /// Executes the provided task by dynamic dispatching as soon as a
    /// worker is free.
    ///
    /// # Arguments
    ///
    /// `task` - The task to be executed.
    fn execute_dyn(&self, task: Box<dyn Executable + Send>) {
        let sender = self.sender.as_ref().expect("Workers::start was never called");
        sender.send(task).expect("worker pool queue is closed");
    }

    /// Executes the provided tasks by dynamic dispatching, spread across
    /// whichever workers become free.
    ///
    /// # Arguments
    ///
    /// `tasks` - The tasks to be executed.
    fn execute_batch(&self, tasks: Vec<Box<dyn Executable + Send>>) {
        for task in tasks {
            self.execute_dyn(task);
        }
    }
}
