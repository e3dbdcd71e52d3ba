pub(crate) mod io_ext;
