use tasks::{Workers, Task, Dispatcher, Executable};

fn main() {
    // Create a new worker pool.
    let mut workers: Workers = Workers::default();
    workers.start();

    println!("{:?}", workers);

    for round in 0..5 {
        let mut vec: Vec<Box<dyn Executable + Send>> = Vec::new();
        for i in 0..1000 {
            vec.push(Box::new(Task::new(move || {
                println!("round {} job {}", round, i);
            })));
        }
        workers.execute_batch(vec);
        std::thread::sleep(std::time::Duration::from_millis(16));
    }
}
