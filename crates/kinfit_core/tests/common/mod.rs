pub mod synthetic_surface;
