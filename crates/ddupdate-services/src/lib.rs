// # ddupdate Services
//
// Service plugins for the many dynamic DNS providers that take one HTTP
// request per update. Each provider is a `ServiceTemplate`: an URL
// template plus credential, address parameter and reply rules. The same
// template type backs services defined in plugin definition files.
//
// `dry-run` prints the update instead of making it. `nsupdate` sends an
// RFC 2136 update through nsupdate(1).

pub mod builtin;
pub mod dry_run;
pub mod nsupdate;
pub mod template;

pub use builtin::{builtin_template, builtin_templates};
pub use dry_run::{DryRunService, dry_run_report};
pub use nsupdate::{NsupdateService, nsupdate_script};
pub use template::{
    AuthScheme, DEFAULT_SERVICE_TIMEOUT, HttpMethod, PasswordHash, ReplyMatch, ServiceTemplate,
    TemplateConfig,
};

use ddupdate_core::registry::{BuiltinSource, PluginUnit};
use std::sync::Arc;

/// Add `dry-run`, `nsupdate` and the builtin template services to `source`
pub fn register(source: &mut BuiltinSource) {
    source.add(|| Ok(PluginUnit::Service(Arc::new(DryRunService::new()))));
    source.add(|| Ok(PluginUnit::Service(Arc::new(NsupdateService::new()))));
    match builtin_templates() {
        Ok(templates) => {
            for template in templates {
                source.add_unit(PluginUnit::Service(Arc::new(template)));
            }
        }
        Err(e) => source.add(move || Err(ddupdate_core::Error::config(e.to_string()))),
    }
}
