pub mod todo;

pub use todo::{Todo, TodoList};
