//! Configuration for ts3query
//!
//! Centralized connection configuration with sensible defaults.

/// The two flavors of the query protocol
///
/// They differ only in available commands and notifications, not in
/// framing, so the engine treats them identically apart from the default
/// port and the post-connect `selected` push ClientQuery emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryFlavor {
    /// Administrative interface of a TeamSpeak 3 server (port 10011)
    ServerQuery,

    /// Introspection interface of a running TeamSpeak 3 client (port 25639)
    ClientQuery,
}

impl QueryFlavor {
    /// Default TCP port for this flavor
    pub fn default_port(&self) -> u16 {
        match self {
            QueryFlavor::ServerQuery => 10011,
            QueryFlavor::ClientQuery => 25639,
        }
    }
}

/// Connection configuration for a query dispatcher
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Endpoint Configuration
    // -------------------------------------------------------------------------
    /// Host name or address of the query peer
    pub host: String,

    /// TCP port; defaults to the flavor's well-known port
    pub port: u16,

    /// Protocol flavor (ServerQuery or ClientQuery)
    pub flavor: QueryFlavor,

    // -------------------------------------------------------------------------
    // Timeout Configuration
    // -------------------------------------------------------------------------
    /// TCP connect timeout (milliseconds, 0 = OS default)
    pub connect_timeout_ms: u64,

    /// Socket read timeout (milliseconds, 0 = block indefinitely)
    ///
    /// When set, a dispatch that outlives it fails with a timeout error
    /// instead of hanging; the dispatcher stays disconnectable.
    pub read_timeout_ms: u64,

    /// Socket write timeout (milliseconds, 0 = block indefinitely)
    pub write_timeout_ms: u64,

    // -------------------------------------------------------------------------
    // Keep-Alive Configuration
    // -------------------------------------------------------------------------
    /// Idle interval between keep-alive probes sent by the event-driven
    /// dispatcher (milliseconds, 0 = disabled)
    pub keep_alive_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: QueryFlavor::ServerQuery.default_port(),
            flavor: QueryFlavor::ServerQuery,
            connect_timeout_ms: 5000,
            read_timeout_ms: 0,
            write_timeout_ms: 5000,
            keep_alive_interval_ms: 0,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Socket address string ("host:port")
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the host name or address
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Set the TCP port explicitly
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set the protocol flavor and its default port
    ///
    /// Call `port` afterwards to override the well-known port.
    pub fn flavor(mut self, flavor: QueryFlavor) -> Self {
        self.config.flavor = flavor;
        self.config.port = flavor.default_port();
        self
    }

    /// Set the connect timeout (in milliseconds)
    pub fn connect_timeout_ms(mut self, ms: u64) -> Self {
        self.config.connect_timeout_ms = ms;
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    /// Set the keep-alive interval (in milliseconds)
    pub fn keep_alive_interval_ms(mut self, ms: u64) -> Self {
        self.config.keep_alive_interval_ms = ms;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
