use super::ParamSource::{Body, Path, Query};
use super::{HttpMethod, OperationDescriptor, ParamSpec};

pub fn descriptors() -> Vec<OperationDescriptor> {
    vec![
        OperationDescriptor::new(
            "image.pool.info",
            HttpMethod::Get,
            true,
            vec![
                ParamSpec::number("filter", Query, -2),
                ParamSpec::number("start", Query, -1),
                ParamSpec::number("end", Query, -1),
            ],
        ),
        OperationDescriptor::new(
            "image.info",
            HttpMethod::Get,
            true,
            vec![
                ParamSpec::number("id", Path, -1),
                ParamSpec::flag("decrypt", Query, false),
            ],
        ),
        OperationDescriptor::new(
            "image.allocate",
            HttpMethod::Post,
            true,
            vec![
                ParamSpec::text("template", Body, ""),
                ParamSpec::number("datastore", Body, -1),
                ParamSpec::flag("capacity_check", Body, true),
            ],
        ),
        OperationDescriptor::new(
            "image.update",
            HttpMethod::Put,
            true,
            vec![
                ParamSpec::number("id", Path, -1),
                ParamSpec::text("template", Body, ""),
                ParamSpec::flag("merge", Body, true),
            ],
        ),
        OperationDescriptor::new(
            "image.enable",
            HttpMethod::Put,
            true,
            vec![
                ParamSpec::number("id", Path, -1),
                ParamSpec::flag("enable", Body, true),
            ],
        ),
        OperationDescriptor::new(
            "image.persistent",
            HttpMethod::Put,
            true,
            vec![
                ParamSpec::number("id", Path, -1),
                ParamSpec::flag("persistent", Body, true),
            ],
        ),
        OperationDescriptor::new(
            "image.chtype",
            HttpMethod::Put,
            true,
            vec![
                ParamSpec::number("id", Path, -1),
                ParamSpec::text("type", Body, ""),
            ],
        ),
        OperationDescriptor::new(
            "image.clone",
            HttpMethod::Post,
            true,
            vec![
                ParamSpec::number("id", Path, -1),
                ParamSpec::text("name", Body, ""),
                ParamSpec::number("datastore", Body, -1),
            ],
        ),
        OperationDescriptor::new(
            "image.rename",
            HttpMethod::Put,
            true,
            vec![
                ParamSpec::number("id", Path, -1),
                ParamSpec::text("name", Body, ""),
            ],
        ),
        OperationDescriptor::new(
            "image.snapshot.revert",
            HttpMethod::Put,
            true,
            vec![
                ParamSpec::number("id", Path, -1),
                ParamSpec::number("snapshot", Body, -1),
            ],
        ),
        OperationDescriptor::new(
            "image.snapshot.flatten",
            HttpMethod::Put,
            true,
            vec![
                ParamSpec::number("id", Path, -1),
                ParamSpec::number("snapshot", Body, -1),
            ],
        ),
        OperationDescriptor::new(
            "image.snapshot.delete",
            HttpMethod::Delete,
            true,
            vec![
                ParamSpec::number("id", Path, -1),
                ParamSpec::number("snapshot", Query, -1),
            ],
        ),
        OperationDescriptor::new(
            "image.delete",
            HttpMethod::Delete,
            true,
            vec![
                ParamSpec::number("id", Path, -1),
                ParamSpec::flag("force", Query, false),
            ],
        ),
    ]
}
