pub mod buffer_manager;
pub mod managed_vec;
