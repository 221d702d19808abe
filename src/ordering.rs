use crate::model::task::Task;

/// Sort key: status, then priority, then type. Ranks are precomputed on the
/// labels, so comparison does no string work.
pub fn sort_key(task: &Task) -> (u8, u8, u8) {
    (task.status.rank(), task.priority.rank(), task.kind.rank())
}

/// Stable in-place sort; equal keys keep their input order.
pub fn order_tasks(tasks: &mut [Task]) {
    tasks.sort_by_key(sort_key);
}

pub fn ordered(mut tasks: Vec<Task>) -> Vec<Task> {
    order_tasks(&mut tasks);
    tasks
}
