//! Account operations. The own-account read (`user.info` with the default
//! id `-1`) doubles as the credential check during login.

use super::ParamSource::{Body, Path, Query};
use super::{HttpMethod, OperationDescriptor, ParamSpec, ScalarKind};

pub fn descriptors() -> Vec<OperationDescriptor> {
    vec![
        OperationDescriptor::new(
            "user.pool.info",
            HttpMethod::Get,
            true,
            vec![
                ParamSpec::number("filter", Query, -2),
                ParamSpec::number("start", Query, -1),
                ParamSpec::number("end", Query, -1),
            ],
        ),
        OperationDescriptor::new(
            "user.info",
            HttpMethod::Get,
            true,
            vec![
                ParamSpec::number("id", Path, -1),
                ParamSpec::flag("decrypt", Query, false),
            ],
        ),
        OperationDescriptor::new(
            "user.allocate",
            HttpMethod::Post,
            true,
            vec![
                ParamSpec::text("username", Body, ""),
                ParamSpec::text("password", Body, ""),
                ParamSpec::text("driver", Body, "core"),
                ParamSpec::list("groups", Body, ScalarKind::Number),
            ],
        ),
        OperationDescriptor::new(
            "user.update",
            HttpMethod::Put,
            true,
            vec![
                ParamSpec::number("id", Path, -1),
                ParamSpec::text("template", Body, ""),
                ParamSpec::flag("merge", Body, true),
            ],
        ),
        OperationDescriptor::new(
            "user.passwd",
            HttpMethod::Put,
            true,
            vec![
                ParamSpec::number("id", Path, -1),
                ParamSpec::text("password", Body, ""),
            ],
        ),
        OperationDescriptor::new(
            "user.chgrp",
            HttpMethod::Put,
            true,
            vec![
                ParamSpec::number("id", Path, -1),
                ParamSpec::number("group", Body, -1),
            ],
        ),
        OperationDescriptor::new(
            "user.group.set",
            HttpMethod::Put,
            true,
            vec![
                ParamSpec::number("id", Path, -1),
                ParamSpec::list("groups", Body, ScalarKind::Number),
            ],
        ),
        OperationDescriptor::new(
            "user.enable",
            HttpMethod::Put,
            true,
            vec![
                ParamSpec::number("id", Path, -1),
                ParamSpec::flag("enable", Body, true),
            ],
        ),
        OperationDescriptor::new(
            "user.quota",
            HttpMethod::Put,
            true,
            vec![
                ParamSpec::number("id", Path, -1),
                ParamSpec::text("template", Body, ""),
            ],
        ),
        OperationDescriptor::new(
            "user.delete",
            HttpMethod::Delete,
            true,
            vec![ParamSpec::number("id", Path, -1)],
        ),
    ]
}
