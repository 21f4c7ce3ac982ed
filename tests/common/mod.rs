#![allow(dead_code)]

pub mod mock_http {
    use std::io::Read;
    use std::sync::{Arc, Mutex};
    use std::thread::{self, JoinHandle};
    use tiny_http::{Header, Response, Server};

    /// What the mock saw for one request.
    #[derive(Debug, Clone)]
    pub struct RecordedRequest {
        pub method: String,
        pub url: String,
        pub headers: Vec<(String, String)>,
        pub body: String,
    }

    impl RecordedRequest {
        /// Header value by case-insensitive name.
        pub fn header(&self, name: &str) -> Option<&str> {
            self.headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str())
        }

        pub fn path(&self) -> &str {
            self.url.split('?').next().unwrap_or_default()
        }
    }

    pub struct MockResponse {
        pub status: u16,
        pub body: Vec<u8>,
        pub content_type: &'static str,
    }

    impl MockResponse {
        pub fn json(status: u16, body: &str) -> Self {
            Self {
                status,
                body: body.as_bytes().to_vec(),
                content_type: "application/json",
            }
        }

        pub fn bytes(body: Vec<u8>) -> Self {
            Self {
                status: 200,
                body,
                content_type: "application/zip",
            }
        }

        pub fn status(status: u16) -> Self {
            Self {
                status,
                body: Vec::new(),
                content_type: "text/plain",
            }
        }
    }

    /// HTTP server on an ephemeral port that records every request and
    /// answers through `handler`. Stops when dropped.
    pub struct MockServer {
        url: String,
        server: Arc<Server>,
        requests: Arc<Mutex<Vec<RecordedRequest>>>,
        handle: Option<JoinHandle<()>>,
    }

    impl MockServer {
        pub fn start<F>(handler: F) -> Self
        where
            F: Fn(&RecordedRequest) -> MockResponse + Send + 'static,
        {
            let server = Arc::new(Server::http("127.0.0.1:0").unwrap());
            let addr = server.server_addr().to_ip().unwrap();
            let url = format!("http://{}:{}", addr.ip(), addr.port());
            let requests = Arc::new(Mutex::new(Vec::new()));

            let handle = {
                let server = Arc::clone(&server);
                let requests = Arc::clone(&requests);
                thread::spawn(move || {
                    for mut request in server.incoming_requests() {
                        let mut body = String::new();
                        let _ = request.as_reader().read_to_string(&mut body);
                        let recorded = RecordedRequest {
                            method: request.method().to_string(),
                            url: request.url().to_string(),
                            headers: request
                                .headers()
                                .iter()
                                .map(|h| (h.field.to_string(), h.value.to_string()))
                                .collect(),
                            body,
                        };
                        let reply = handler(&recorded);
                        requests.lock().unwrap().push(recorded);
                        let content_type =
                            Header::from_bytes(&b"Content-Type"[..], reply.content_type.as_bytes())
                                .unwrap();
                        let response = Response::from_data(reply.body)
                            .with_status_code(reply.status)
                            .with_header(content_type);
                        let _ = request.respond(response);
                    }
                })
            };

            Self {
                url,
                server,
                requests,
                handle: Some(handle),
            }
        }

        /// Base URL without a trailing slash.
        pub fn url(&self) -> &str {
            &self.url
        }

        pub fn requests(&self) -> Vec<RecordedRequest> {
            self.requests.lock().unwrap().clone()
        }

        pub fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    impl Drop for MockServer {
        fn drop(&mut self) {
            self.server.unblock();
            if let Some(handle) = self.handle.take() {
                let _ = handle.join();
            }
        }
    }
}

pub mod fixtures {
    use std::fs;
    use std::io::{Cursor, Write};
    use std::path::Path;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    /// Write `files` (relative path, contents) under `root`.
    pub fn write_tree(root: &Path, files: &[(&str, &str)]) {
        for (relative, contents) in files {
            let path = root.join(relative);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(path, contents).unwrap();
        }
    }

    /// Zip archive holding `files`, every entry prefixed with `wrapper/` when
    /// given (the layout GitHub zipballs use).
    pub fn zip_archive(wrapper: Option<&str>, files: &[(&str, &str)]) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        {
            let mut zip = ZipWriter::new(&mut buffer);
            let options = SimpleFileOptions::default();
            if let Some(wrapper) = wrapper {
                zip.add_directory(format!("{wrapper}/"), options).unwrap();
            }
            for (relative, contents) in files {
                let name = match wrapper {
                    Some(w) => format!("{w}/{relative}"),
                    None => relative.to_string(),
                };
                zip.start_file(name, options).unwrap();
                zip.write_all(contents.as_bytes()).unwrap();
            }
            zip.finish().unwrap();
        }
        buffer.into_inner()
    }

    /// Template repository with one TypeScript/Azure template under `templates/`.
    pub const TEMPLATE_REPO: &[(&str, &str)] = &[
        (
            "templates/typescript-azure/package.json",
            "{\n  \"name\": \"{project-name}\",\n  \"version\": \"{version}\"\n}\n",
        ),
        (
            "templates/typescript-azure/infra/main.bicep",
            "param location string = '{cloud}'\n// {entity-count} entities: {entity-names}\n",
        ),
        ("templates/python-aws/requirements.txt", "fastapi\n"),
        ("README.md", "Template repository\n"),
    ];

    pub const CUSTOMER_TS: &str = "// @Entity\nexport interface Customer {\n  id: number;\n  email?: string;\n}\n";
}
