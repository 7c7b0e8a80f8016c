#![allow(dead_code)]

pub mod fixtures {
    use brrtdispatch::dispatcher::ClassDispatcher;
    use brrtdispatch::resource::ResourceMethod;
    use brrtdispatch::router::RoutingTable;
    use http::Method;
    use std::sync::Arc;

    pub fn endpoint(name: &str, method: Method, path: &str) -> ResourceMethod {
        ResourceMethod::endpoint(name, method, path)
            .build()
            .expect("valid endpoint")
    }

    pub fn locator(name: &str, path: &str) -> ResourceMethod {
        ResourceMethod::locator(name, path)
            .build()
            .expect("valid locator")
    }

    pub fn table<I>(methods: I) -> Arc<RoutingTable>
    where
        I: IntoIterator<Item = ResourceMethod>,
    {
        Arc::new(RoutingTable::from_resources(methods))
    }

    /// Dispatcher at offset 0 that answers 404 on a miss
    pub fn dispatcher<I>(methods: I) -> ClassDispatcher
    where
        I: IntoIterator<Item = ResourceMethod>,
    {
        ClassDispatcher::new(table(methods), 0, false)
    }
}

pub mod temp_files {
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// Temporary YAML file removed when the handle is dropped
    pub fn create_temp_yaml(content: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new()
            .prefix("brrt_test_")
            .suffix(".yaml")
            .tempfile()
            .expect("create temp file");
        file.write_all(content.as_bytes()).expect("write temp file");
        file.flush().expect("flush temp file");
        file
    }
}
