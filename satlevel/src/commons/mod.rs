pub mod acquisition_window;
pub mod basic_functions;
