//! Commands every PowerShell host provides.
//!
//! Registered with no module so they survive any `--module` filter.

/// Core, Management, Utility, Security, and Archive cmdlets.
pub(super) const CMDLETS: &[&str] = &[
    // Microsoft.PowerShell.Core
    "Add-History",
    "Clear-History",
    "Connect-PSSession",
    "Disconnect-PSSession",
    "Enter-PSSession",
    "Exit-PSSession",
    "Export-ModuleMember",
    "ForEach-Object",
    "Get-Command",
    "Get-Help",
    "Get-History",
    "Get-Job",
    "Get-Module",
    "Get-PSSession",
    "Import-Module",
    "Invoke-Command",
    "Invoke-History",
    "New-Module",
    "New-ModuleManifest",
    "New-PSSession",
    "Out-Default",
    "Out-Host",
    "Out-Null",
    "Receive-Job",
    "Register-ArgumentCompleter",
    "Remove-Job",
    "Remove-Module",
    "Remove-PSSession",
    "Set-PSDebug",
    "Set-StrictMode",
    "Start-Job",
    "Stop-Job",
    "Test-ModuleManifest",
    "Wait-Job",
    "Where-Object",
    // Microsoft.PowerShell.Management
    "Add-Content",
    "Clear-Content",
    "Clear-Item",
    "Clear-ItemProperty",
    "Convert-Path",
    "Copy-Item",
    "Copy-ItemProperty",
    "Get-ChildItem",
    "Get-Clipboard",
    "Get-ComputerInfo",
    "Get-Content",
    "Get-Item",
    "Get-ItemProperty",
    "Get-ItemPropertyValue",
    "Get-Location",
    "Get-Process",
    "Get-PSDrive",
    "Get-PSProvider",
    "Get-Service",
    "Get-TimeZone",
    "Invoke-Item",
    "Join-Path",
    "Move-Item",
    "Move-ItemProperty",
    "New-Item",
    "New-ItemProperty",
    "New-PSDrive",
    "New-Service",
    "Pop-Location",
    "Push-Location",
    "Remove-Item",
    "Remove-ItemProperty",
    "Remove-PSDrive",
    "Rename-Item",
    "Rename-ItemProperty",
    "Resolve-Path",
    "Restart-Computer",
    "Restart-Service",
    "Set-Clipboard",
    "Set-Content",
    "Set-Item",
    "Set-ItemProperty",
    "Set-Location",
    "Set-Service",
    "Set-TimeZone",
    "Split-Path",
    "Start-Process",
    "Start-Service",
    "Stop-Computer",
    "Stop-Process",
    "Stop-Service",
    "Test-Connection",
    "Test-Path",
    "Wait-Process",
    // Microsoft.PowerShell.Utility
    "Add-Member",
    "Add-Type",
    "Clear-Variable",
    "Compare-Object",
    "ConvertFrom-Csv",
    "ConvertFrom-Json",
    "ConvertFrom-Markdown",
    "ConvertFrom-StringData",
    "ConvertTo-Csv",
    "ConvertTo-Html",
    "ConvertTo-Json",
    "ConvertTo-Xml",
    "Debug-Runspace",
    "Export-Alias",
    "Export-Clixml",
    "Export-Csv",
    "Format-Custom",
    "Format-Hex",
    "Format-List",
    "Format-Table",
    "Format-Wide",
    "Get-Alias",
    "Get-Culture",
    "Get-Date",
    "Get-Error",
    "Get-Event",
    "Get-EventSubscriber",
    "Get-FileHash",
    "Get-FormatData",
    "Get-Host",
    "Get-Member",
    "Get-PSBreakpoint",
    "Get-PSCallStack",
    "Get-Random",
    "Get-Runspace",
    "Get-SecureRandom",
    "Get-TraceSource",
    "Get-TypeData",
    "Get-UICulture",
    "Get-Unique",
    "Get-Uptime",
    "Get-Variable",
    "Get-Verb",
    "Group-Object",
    "Import-Alias",
    "Import-Clixml",
    "Import-Csv",
    "Import-LocalizedData",
    "Import-PowerShellDataFile",
    "Invoke-Expression",
    "Invoke-RestMethod",
    "Invoke-WebRequest",
    "Join-String",
    "Measure-Command",
    "Measure-Object",
    "New-Alias",
    "New-Event",
    "New-Guid",
    "New-Object",
    "New-TemporaryFile",
    "New-TimeSpan",
    "New-Variable",
    "Out-File",
    "Out-GridView",
    "Out-String",
    "Read-Host",
    "Register-EngineEvent",
    "Register-ObjectEvent",
    "Remove-Event",
    "Remove-PSBreakpoint",
    "Remove-TypeData",
    "Remove-Variable",
    "Select-Object",
    "Select-String",
    "Select-Xml",
    "Send-MailMessage",
    "Set-Alias",
    "Set-Date",
    "Set-PSBreakpoint",
    "Set-TraceSource",
    "Set-Variable",
    "Show-Markdown",
    "Sort-Object",
    "Start-Sleep",
    "Tee-Object",
    "Test-Json",
    "Trace-Command",
    "Unregister-Event",
    "Update-FormatData",
    "Update-TypeData",
    "Wait-Debugger",
    "Wait-Event",
    "Write-Debug",
    "Write-Error",
    "Write-Host",
    "Write-Information",
    "Write-Output",
    "Write-Progress",
    "Write-Verbose",
    "Write-Warning",
    // Microsoft.PowerShell.Security
    "ConvertFrom-SecureString",
    "ConvertTo-SecureString",
    "Get-Acl",
    "Get-AuthenticodeSignature",
    "Get-Credential",
    "Get-ExecutionPolicy",
    "Get-PfxCertificate",
    "Protect-CmsMessage",
    "Set-Acl",
    "Set-AuthenticodeSignature",
    "Set-ExecutionPolicy",
    "Unprotect-CmsMessage",
    // Microsoft.PowerShell.Archive
    "Compress-Archive",
    "Expand-Archive",
];

/// Functions defined in every session.
pub(super) const FUNCTIONS: &[&str] = &[
    "cd..",
    "cd\\",
    "Clear-Host",
    "help",
    "mkdir",
    "more",
    "oss",
    "Pause",
    "prompt",
    "TabExpansion2",
];

/// Default aliases.
pub(super) const ALIASES: &[&str] = &[
    "%", "?", "ac", "cat", "cd", "chdir", "clc", "clear", "clhy", "cli", "clp", "cls", "clv",
    "cnsn", "compare", "copy", "cp", "cpi", "cpp", "cvpa", "dbp", "del", "diff", "dir", "dnsn",
    "ebp", "echo", "epal", "epcsv", "erase", "etsn", "exsn", "fc", "fhx", "fl", "foreach", "ft",
    "fw", "gal", "gbp", "gc", "gcb", "gci", "gcm", "gcs", "gdr", "ghy", "gi", "gin", "gjb", "gl",
    "gm", "gmo", "gp", "gps", "gpv", "group", "gsn", "gsv", "gtz", "gu", "gv", "h", "history",
    "icm", "iex", "ihy", "ii", "ipal", "ipcsv", "ipmo", "irm", "iwr", "kill", "ls", "man", "md",
    "measure", "mi", "mount", "move", "mp", "mv", "nal", "ndr", "ni", "nmo", "nsn", "nv", "ogv",
    "oh", "popd", "ps", "pushd", "pwd", "r", "rbp", "rcjb", "rcsn", "rd", "rdr", "ren", "ri",
    "rjb", "rm", "rmdir", "rmo", "rni", "rnp", "rp", "rsn", "rv", "rvpa", "sajb", "sal", "saps",
    "sasv", "sbp", "scb", "select", "set", "shcm", "si", "sl", "sleep", "sls", "sort", "sp",
    "spjb", "spps", "spsv", "start", "stz", "sv", "tee", "type", "where", "wjb", "write",
];
