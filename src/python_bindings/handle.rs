//! Python wrapper around [`Magic`](crate::handle::Magic).

use crate::config::Param;
use crate::engine::Classification;
use crate::handle::Magic;
use crate::magic::MagicSource;
use pyo3::prelude::*;
use pyo3::types::PyBytes;

fn sources(paths: Option<Vec<String>>) -> Vec<MagicSource> {
    paths
        .unwrap_or_default()
        .into_iter()
        .map(MagicSource::path)
        .collect()
}

fn param(name: &str) -> PyResult<Param> {
    Ok(name.parse::<Param>()?)
}

/// Classification handle.
#[pyclass(name = "Magic")]
pub struct PyMagic {
    inner: Magic,
}

#[pymethods]
impl PyMagic {
    #[new]
    #[pyo3(signature = (flags = 0))]
    fn new(flags: u32) -> PyResult<Self> {
        Ok(Self {
            inner: Magic::open_raw(flags)?,
        })
    }

    /// Load rule files or caches; with no paths, the defaults.
    #[pyo3(signature = (paths = None))]
    fn load(&mut self, paths: Option<Vec<String>>) -> PyResult<()> {
        Ok(self.inner.load(&sources(paths))?)
    }

    fn load_buffers(&mut self, buffers: Vec<Vec<u8>>) -> PyResult<()> {
        let slices: Vec<&[u8]> = buffers.iter().map(Vec::as_slice).collect();
        Ok(self.inner.load_buffers(&slices)?)
    }

    #[pyo3(signature = (paths = None))]
    fn compile<'py>(&mut self, py: Python<'py>, paths: Option<Vec<String>>) -> PyResult<Bound<'py, PyBytes>> {
        let bytes = self.inner.compile(&sources(paths))?;
        Ok(PyBytes::new(py, &bytes))
    }

    fn compile_to_path(&mut self, paths: Vec<String>, output: String) -> PyResult<()> {
        Ok(self.inner.compile_to_path(&sources(Some(paths)), output)?)
    }

    #[pyo3(signature = (paths = None))]
    fn check(&mut self, paths: Option<Vec<String>>) -> PyResult<()> {
        Ok(self.inner.check(&sources(paths))?)
    }

    #[pyo3(signature = (paths = None))]
    fn list(&mut self, paths: Option<Vec<String>>) -> PyResult<String> {
        Ok(self.inner.list(&sources(paths))?)
    }

    fn file(&mut self, path: String) -> PyResult<String> {
        Ok(self.inner.classify_file(path)?)
    }

    fn buffer(&mut self, data: Vec<u8>) -> PyResult<String> {
        Ok(self.inner.classify_buffer(&data)?)
    }

    /// Classify an open file descriptor without closing it.
    #[cfg(unix)]
    fn descriptor(&mut self, fd: i32) -> PyResult<String> {
        // Safety: the caller keeps `fd` open for the duration of the call;
        // the handle only duplicates it.
        let borrowed = unsafe { std::os::fd::BorrowedFd::borrow_raw(fd) };
        Ok(self.inner.classify_descriptor(borrowed)?)
    }

    /// Full classification of a buffer.
    fn detect(&self, data: Vec<u8>) -> PyResult<Classification> {
        Ok(self.inner.classifier().classify_bytes(&data)?)
    }

    #[getter]
    fn get_flags(&self) -> u32 {
        self.inner.flags().bits()
    }

    #[setter]
    fn set_flags(&mut self, flags: u32) -> PyResult<()> {
        Ok(self.inner.set_flags_raw(flags)?)
    }

    fn getparam(&self, name: &str) -> PyResult<usize> {
        Ok(self.inner.get_param(param(name)?))
    }

    fn setparam(&mut self, name: &str, value: usize) -> PyResult<()> {
        Ok(self.inner.set_param(param(name)?, value)?)
    }

    #[getter]
    fn error(&self) -> Option<String> {
        self.inner.last_error().map(str::to_string)
    }

    #[getter]
    fn errno(&self) -> i32 {
        self.inner.errno()
    }
}

pub fn register_handle_bindings(_py: Python<'_>, m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyMagic>()?;
    Ok(())
}
