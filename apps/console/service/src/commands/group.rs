use super::ParamSource::{Body, Path, Query};
use super::{HttpMethod, OperationDescriptor, ParamSpec};

pub fn descriptors() -> Vec<OperationDescriptor> {
    vec![
        OperationDescriptor::new(
            "group.pool.info",
            HttpMethod::Get,
            true,
            vec![
                ParamSpec::number("filter", Query, -2),
                ParamSpec::number("start", Query, -1),
                ParamSpec::number("end", Query, -1),
            ],
        ),
        OperationDescriptor::new(
            "group.info",
            HttpMethod::Get,
            true,
            vec![
                ParamSpec::number("id", Path, -1),
                ParamSpec::flag("decrypt", Query, false),
            ],
        ),
        OperationDescriptor::new(
            "group.allocate",
            HttpMethod::Post,
            true,
            vec![ParamSpec::text("name", Body, "")],
        ),
        OperationDescriptor::new(
            "group.update",
            HttpMethod::Put,
            true,
            vec![
                ParamSpec::number("id", Path, -1),
                ParamSpec::text("template", Body, ""),
                ParamSpec::flag("merge", Body, true),
            ],
        ),
        OperationDescriptor::new(
            "group.quota",
            HttpMethod::Put,
            true,
            vec![
                ParamSpec::number("id", Path, -1),
                ParamSpec::text("template", Body, ""),
            ],
        ),
        OperationDescriptor::new(
            "group.delete",
            HttpMethod::Delete,
            true,
            vec![ParamSpec::number("id", Path, -1)],
        ),
    ]
}
